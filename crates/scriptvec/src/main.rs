use std::process;

use scriptvec::config::{EmbedConfig, Script};
use scriptvec::embeddings::embed_text;
use scriptvec::pooling::format_vector;

fn main() {
    // Diagnostics go to stderr only; stdout carries nothing but vector lines.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let Some(text) = input_text(std::env::args().skip(1)) else {
        eprintln!("Usage: scriptvec <text>");
        process::exit(1);
    };

    let config = EmbedConfig::default();
    for script in Script::PIPELINE_ORDER {
        match embed_text(&config, script, &text) {
            // One line per script, streamed as soon as it is ready.
            Ok(vector) => println!("{}", format_vector(&vector)),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }
}

/// Join the positional arguments into the input text; `None` when absent.
fn input_text(args: impl Iterator<Item = String>) -> Option<String> {
    let parts: Vec<String> = args.collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_text_absent() {
        assert_eq!(input_text(std::iter::empty()), None);
    }

    #[test]
    fn test_input_text_joins_with_single_spaces() {
        let args = ["hello", "wide", "world"].iter().map(|s| s.to_string());
        assert_eq!(input_text(args).as_deref(), Some("hello wide world"));
    }

    #[test]
    fn test_input_text_single_argument_unchanged() {
        let args = std::iter::once("你好，世界".to_string());
        assert_eq!(input_text(args).as_deref(), Some("你好，世界"));
    }
}
