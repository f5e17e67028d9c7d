/// Lazily parses a value from an environment variable, falling back to a
/// default if the variable is unset or fails to parse. Used by [`crate::cnf`]
/// to make the scheduler's tunables overridable without a config file.
#[macro_export]
#[doc(hidden)]
macro_rules! lazy_env_parse {
	($key:expr, $t:ty, $default:expr) => {
		once_cell::sync::Lazy::new(|| {
			std::env::var($key).ok().and_then(|s| s.parse::<$t>().ok()).unwrap_or($default)
		})
	};
}
