mod batch;
mod handle;
mod prompts;
