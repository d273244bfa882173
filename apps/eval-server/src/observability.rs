use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &[&str] = &["eval_server=debug", "tower_http=info"];

/// Install the global fmt subscriber. `RUST_LOG` takes precedence over the
/// built-in directives.
pub fn init_tracing() -> anyhow::Result<()> {
    let mut filter = EnvFilter::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        for directive in DEFAULT_DIRECTIVES {
            filter = filter.add_directive(directive.parse()?);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        for directive in DEFAULT_DIRECTIVES {
            assert!(directive.parse::<tracing_subscriber::filter::Directive>().is_ok());
        }
    }
}
