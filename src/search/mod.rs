pub mod search;
pub mod results;
pub mod mapper;
pub mod searcher;
pub mod executor;
pub mod semaphore;
pub mod dispatcher;
