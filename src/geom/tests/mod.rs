mod test_cache_basic;
