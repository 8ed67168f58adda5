pub mod approved_cache;
