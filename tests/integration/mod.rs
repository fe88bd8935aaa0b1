mod api;
mod engine;
mod history;
