/// Returns the cached response for `$key`, or awaits `$block` and caches its result.
///
/// `$cache` must expose `get_from_cache` and `insert` (see `ResponseCache`). Errors from
/// `$block` propagate and are never cached.
///
/// # Example
/// ```rust,ignore
/// let response = cached!(state.cache, key, async move {
///     compute_response().await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $block:expr) => {{
        match $cache.get_from_cache(&$key).await {
            Ok(Some(hit)) => Ok(hit),
            Ok(None) => match $block.await {
                Ok(value) => {
                    $cache.insert($key.clone(), value.clone()).await;
                    Ok(value)
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        }
    }};
}
