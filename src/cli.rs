use std::path::PathBuf;

use clap::Parser;

use crate::writer::WordOrder;

/// Links 16-bit word object modules into one flat image loadable at address 0.
#[derive(Debug, Parser)]
#[command(name = "dcld", version, about)]
pub struct Args {
    #[arg(short = 'o', long = "output", default_value = "a.bin")]
    pub output: PathBuf,

    /// Write a link map; defaults to the output path with a `.map` extension.
    #[arg(short = 'p', long = "map", num_args = 0..=1, default_missing_value = "")]
    pub map: Option<String>,

    /// Store each word low byte first.
    #[arg(long = "little-endian")]
    pub little_endian: bool,

    #[arg(long = "verbose", short = 'v')]
    pub verbose: bool,

    /// Log filter (error, warn, info, debug, trace); RUST_LOG takes precedence.
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,

    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<String>,
}

impl Args {
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output.clone()
    }

    #[must_use]
    pub fn map_path(&self) -> Option<PathBuf> {
        match self.map.as_deref() {
            None => None,
            Some("") => Some(self.output.with_extension("map")),
            Some(path) => Some(PathBuf::from(path)),
        }
    }

    #[must_use]
    pub fn word_order(&self) -> WordOrder {
        if self.little_endian {
            WordOrder::Little
        } else {
            WordOrder::Big
        }
    }

    /// Filter directive for the log subscriber; `--verbose` raises it to `info`.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        if self.verbose && matches!(self.log_level.as_str(), "error" | "warn") {
            "info"
        } else {
            self.log_level.as_str()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::Args;
    use crate::writer::WordOrder;

    #[test]
    fn map_defaults_next_to_output() {
        let args = Args::parse_from(["dcld", "-o", "out/prog.bin", "a.o", "-p"]);
        assert_eq!(args.map_path(), Some(PathBuf::from("out/prog.map")));
        assert_eq!(args.inputs, vec!["a.o".to_string()]);

        let args = Args::parse_from(["dcld", "--map=prog.txt", "a.o", "b.o"]);
        assert_eq!(args.map_path(), Some(PathBuf::from("prog.txt")));
        assert_eq!(args.output_path(), PathBuf::from("a.bin"));
        assert_eq!(args.inputs.len(), 2);
    }

    #[test]
    fn verbose_raises_log_filter() {
        let args = Args::parse_from(["dcld", "a.o"]);
        assert_eq!(args.log_filter(), "warn");
        assert_eq!(args.map_path(), None);
        assert_eq!(args.word_order(), WordOrder::Big);

        let args = Args::parse_from(["dcld", "-v", "--little-endian", "a.o"]);
        assert_eq!(args.log_filter(), "info");
        assert_eq!(args.word_order(), WordOrder::Little);

        let args = Args::parse_from(["dcld", "-v", "--log-level", "debug", "a.o"]);
        assert_eq!(args.log_filter(), "debug");
    }

    #[test]
    fn requires_inputs() {
        assert!(Args::try_parse_from(["dcld"]).is_err());
    }
}
