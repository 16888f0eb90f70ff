/// Log output for the runtime. The library only emits `tracing` events under
/// the `tagvm` and `genheap` targets; a binary decides where they go.
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "tagvm=info,genheap=info";

/// Install a compact stderr subscriber filtered by `RUST_LOG`. Calling this
/// more than once is harmless.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_init_twice() {
        init_logging();
        init_logging();
    }
}
