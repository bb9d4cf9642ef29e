pub mod pin_lru;
