pub mod db_utils;
pub mod lookups;
pub mod pagination;
pub mod site_cache;
