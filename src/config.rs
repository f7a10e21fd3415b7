use clap::{Arg, ArgMatches, Command};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SECRET_KEY: &str = "default_secret_key";
pub const DEFAULT_SUMMARIZER_URL: &str =
    "https://api-inference.huggingface.co/models/falconsai/text_summarization";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_TESSERACT_CMD: &str = "tesseract";
pub const DEFAULT_OCR_LANG: &str = "eng";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024; // 16 MiB

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Environment lookup backed by the process environment, falling back to the
/// variables of a `.env` file. Real environment variables always win and the
/// process environment itself is never modified.
#[derive(Debug, Clone, Default)]
pub struct EnvLookup {
    dotenv: HashMap<String, String>,
}

impl EnvLookup {
    /// Looks for `.env` in the working directory and its parents. A missing
    /// file is not an error.
    pub fn discover() -> Result<Self, dotenvy::Error> {
        match dotenvy::dotenv_iter() {
            Ok(iter) => Self::collect(iter),
            Err(e) if e.not_found() => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, dotenvy::Error> {
        Self::collect(dotenvy::from_path_iter(path)?)
    }

    fn collect<I>(iter: I) -> Result<Self, dotenvy::Error>
    where
        I: Iterator<Item = Result<(String, String), dotenvy::Error>>,
    {
        let dotenv = iter.collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self { dotenv })
    }

    /// Number of variables read from the `.env` file.
    pub fn file_vars(&self) -> usize {
        self.dotenv.len()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.get_with(name, |key| std::env::var(key).ok())
    }

    fn get_with<F>(&self, name: &str, process_env: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        process_env(name).or_else(|| self.dotenv.get(name).cloned())
    }
}

/// Process-wide settings, resolved once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub secret_key: String,
    pub api_token: Option<String>,
    pub host: IpAddr,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub summarizer_url: url::Url,
    pub summarizer_timeout: Duration,
    pub tesseract_cmd: String,
    pub ocr_lang: String,
    pub max_upload_bytes: usize,
    pub quiet: bool,
}

impl AppConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }

    /// Resolves every setting from the command line first, then from the
    /// environment lookup, then from the built-in default.
    pub fn from_matches<F>(matches: &ArgMatches, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |arg: &str, var: &str| -> Option<String> {
            matches
                .get_one::<String>(arg)
                .cloned()
                .or_else(|| env(var))
                .filter(|value| !value.trim().is_empty())
        };

        let port = match pick("port", "PORT") {
            Some(raw) => parse_value("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        let host = match pick("host", "HOST") {
            Some(raw) => parse_value("HOST", &raw)?,
            None => DEFAULT_HOST,
        };

        let summarizer_url = pick("summarizer-url", "SUMMARIZER_URL")
            .unwrap_or_else(|| DEFAULT_SUMMARIZER_URL.to_string());
        let summarizer_url =
            url::Url::parse(&summarizer_url).map_err(|e| ConfigError::InvalidValue {
                name: "SUMMARIZER_URL",
                value: summarizer_url.clone(),
                reason: e.to_string(),
            })?;

        let timeout_secs: u64 = match pick("timeout", "SUMMARIZER_TIMEOUT_SECS") {
            Some(raw) => parse_value("SUMMARIZER_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let max_upload_bytes: usize = match pick("max-upload-bytes", "MAX_UPLOAD_BYTES") {
            Some(raw) => parse_value("MAX_UPLOAD_BYTES", &raw)?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let config = Self {
            secret_key: pick("secret-key", "SECRET_KEY")
                .unwrap_or_else(|| DEFAULT_SECRET_KEY.to_string()),
            api_token: pick("api-token", "HUGGINGFACE_API_TOKEN"),
            host,
            port,
            upload_dir: PathBuf::from(
                pick("upload-dir", "UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
            ),
            summarizer_url,
            summarizer_timeout: Duration::from_secs(timeout_secs),
            tesseract_cmd: pick("tesseract-cmd", "TESSERACT_CMD")
                .unwrap_or_else(|| DEFAULT_TESSERACT_CMD.to_string()),
            ocr_lang: pick("ocr-lang", "OCR_LANG").unwrap_or_else(|| DEFAULT_OCR_LANG.to_string()),
            max_upload_bytes,
            quiet: matches.get_flag("quiet"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.summarizer_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                name: "SUMMARIZER_URL",
                value: self.summarizer_url.to_string(),
                reason: "expected an http or https URL".to_string(),
            });
        }
        if self.summarizer_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "SUMMARIZER_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "timeout must be positive".to_string(),
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_UPLOAD_BYTES",
                value: "0".to_string(),
                reason: "upload limit must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Command line definition. Every option has an environment fallback that is
/// applied in [`AppConfig::from_matches`].
pub fn cli() -> Command {
    let option = |id: &'static str, value_name: &'static str, help: &'static str| {
        Arg::new(id)
            .long(id)
            .value_name(value_name)
            .help(help)
            .action(clap::ArgAction::Set)
    };

    Command::new("bill-summarizer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Web utility that summarizes pasted text, PDFs and images")
        .long_about(
            "Serves a single page where text can be pasted or a document uploaded.\n\
            - PDF uploads are converted to text with pdf-extract\n\
            - PNG/JPEG/HEIC uploads are read with the tesseract OCR engine\n\
            - The resulting text is summarized by a hosted Hugging Face model",
        )
        .arg(option(
            "env-file",
            "PATH",
            "Read variables from this file instead of ./.env",
        ))
        .arg(option("port", "PORT", "Port to listen on [env: PORT, default: 5000]"))
        .arg(option("host", "ADDR", "Address to bind [env: HOST, default: 0.0.0.0]"))
        .arg(option(
            "secret-key",
            "KEY",
            "Session signing secret [env: SECRET_KEY]",
        ))
        .arg(option(
            "api-token",
            "TOKEN",
            "Hugging Face API token [env: HUGGINGFACE_API_TOKEN]",
        ))
        .arg(option(
            "upload-dir",
            "DIR",
            "Scratch directory for uploads [env: UPLOAD_DIR, default: uploads]",
        ))
        .arg(option(
            "summarizer-url",
            "URL",
            "Summarization endpoint [env: SUMMARIZER_URL]",
        ))
        .arg(option(
            "timeout",
            "SECS",
            "Summarization request timeout [env: SUMMARIZER_TIMEOUT_SECS, default: 15]",
        ))
        .arg(option(
            "tesseract-cmd",
            "PATH",
            "Tesseract executable [env: TESSERACT_CMD, default: tesseract]",
        ))
        .arg(option(
            "ocr-lang",
            "LANG",
            "Tesseract language code [env: OCR_LANG, default: eng]",
        ))
        .arg(option(
            "max-upload-bytes",
            "BYTES",
            "Largest accepted request body [env: MAX_UPLOAD_BYTES, default: 16 MiB]",
        ))
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Only log errors and skip the startup banner")
                .action(clap::ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(args: &[&str], env: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let mut argv = vec!["bill-summarizer"];
        argv.extend_from_slice(args);
        let matches = cli().try_get_matches_from(argv).expect("valid arguments");
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_matches(&matches, |key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_flags_or_env() {
        let config = resolve(&[], &[]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:5000");
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.summarizer_url.as_str(), DEFAULT_SUMMARIZER_URL);
        assert_eq!(config.summarizer_timeout, Duration::from_secs(15));
        assert!(config.api_token.is_none());
        assert!(config.uses_default_secret());
        assert!(!config.quiet);
    }

    #[test]
    fn environment_fills_in_missing_flags() {
        let config = resolve(
            &[],
            &[
                ("PORT", "8080"),
                ("HUGGINGFACE_API_TOKEN", "hf_abc"),
                ("SECRET_KEY", "s3cret"),
            ],
        )
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.api_token.as_deref(), Some("hf_abc"));
        assert!(!config.uses_default_secret());
    }

    #[test]
    fn flags_take_precedence_over_environment() {
        let config = resolve(&["--port", "9000", "-q"], &[("PORT", "8080")]).unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.quiet);
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let config = resolve(&[], &[("HUGGINGFACE_API_TOKEN", "  ")]).unwrap();
        assert!(config.api_token.is_none());
    }

    #[test]
    fn rejects_unparsable_port() {
        let err = resolve(&[], &[("PORT", "fifty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "PORT", .. }));
    }

    #[test]
    fn rejects_non_http_summarizer_url() {
        let err = resolve(&["--summarizer-url", "ftp://example.com/model"], &[]).unwrap_err();
        assert!(err.to_string().contains("SUMMARIZER_URL"));
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(resolve(&["--timeout", "0"], &[]).is_err());
    }

    fn dotenv_file(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn dotenv_file_fills_in_unset_variables() {
        let (_dir, path) = dotenv_file(
            "# local settings\nHUGGINGFACE_API_TOKEN=hf_from_file\nPORT=7000\nOCR_LANG=\"deu\"\n",
        );
        let lookup = EnvLookup::from_path(&path).unwrap();
        assert_eq!(lookup.file_vars(), 3);

        let process: HashMap<String, String> =
            HashMap::from([("PORT".to_string(), "8080".to_string())]);
        let env = |name: &str| lookup.get_with(name, |key| process.get(key).cloned());

        let matches = cli().try_get_matches_from(["bill-summarizer"]).unwrap();
        let config = AppConfig::from_matches(&matches, env).unwrap();
        assert_eq!(config.api_token.as_deref(), Some("hf_from_file"));
        assert_eq!(config.ocr_lang, "deu");
        // real environment beats the file
        assert_eq!(config.port, 8080);

        let matches = cli()
            .try_get_matches_from(["bill-summarizer", "--ocr-lang", "fra"])
            .unwrap();
        let config = AppConfig::from_matches(&matches, env).unwrap();
        assert_eq!(config.ocr_lang, "fra");
    }

    #[test]
    fn malformed_dotenv_file_is_an_error() {
        let (_dir, path) = dotenv_file("THIS IS NOT VALID\n");
        assert!(EnvLookup::from_path(&path).is_err());
    }

    #[test]
    fn missing_dotenv_file_is_an_error_only_when_named() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EnvLookup::from_path(&dir.path().join(".env")).is_err());
        assert_eq!(EnvLookup::default().file_vars(), 0);
    }
}
