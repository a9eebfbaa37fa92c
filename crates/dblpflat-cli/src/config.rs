use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::ValueEnum;
use dblpflat_core::{EntityKind, ExtractionRequest, Feature, PassSpec, RequestError};
use dblpflat_store::{CellMode, DEFAULT_BATCH_SIZE};
use serde::{Deserialize, Serialize};

pub const SOURCE_ENV: &str = "DBLP_SOURCE_PATH";
pub const SCHEMA_ENV: &str = "DBLP_SCHEMA_PATH";
pub const OUTPUT_ENV: &str = "DBLPFLAT_OUTPUT";

/// Output path meaning standard output (JSON lines only).
pub const STDOUT: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Sqlite,
    Jsonl,
}

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub source: Option<String>,
    pub schema: Option<String>,
    pub output: Option<String>,
    pub format: Option<OutputFormat>,
    pub cells: Option<CellMode>,
    pub batch_size: Option<usize>,
    pub max_elements: Option<u64>,
    #[serde(rename = "pass")]
    pub passes: Option<Vec<PassConfig>>,
}

/// One `[[pass]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassConfig {
    pub table: String,
    pub entity_types: Vec<String>,
    pub features: Vec<String>,
    #[serde(default)]
    pub include_key: bool,
}

/// Platform config directory path: `<config_dir>/dblpflat/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dblpflat").join("config.toml"))
}

/// Load config by cascading CWD `.dblpflat.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".dblpflat.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Load a config file named on the command line. Unlike the cascaded
/// files, a missing or broken explicit config is an error.
pub fn read_config(path: &Path) -> anyhow::Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("invalid config file {}", path.display()))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        source: overlay.source.or(base.source),
        schema: overlay.schema.or(base.schema),
        output: overlay.output.or(base.output),
        format: overlay.format.or(base.format),
        cells: overlay.cells.or(base.cells),
        batch_size: overlay.batch_size.or(base.batch_size),
        max_elements: overlay.max_elements.or(base.max_elements),
        passes: overlay.passes.or(base.passes),
    }
}

/// Values given as command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source: Option<PathBuf>,
    pub schema: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub cells: Option<String>,
    pub batch_size: Option<usize>,
    pub max_elements: Option<u64>,
}

/// Fully resolved settings for an `extract` run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: PathBuf,
    pub schema: Option<PathBuf>,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub cells: CellMode,
    pub batch_size: usize,
    pub passes: Vec<PassSpec>,
}

impl Settings {
    pub fn writes_to_stdout(&self) -> bool {
        self.format == OutputFormat::Jsonl && self.output.as_os_str() == STDOUT
    }
}

/// Resolve configuration: CLI flags > env vars > config file > defaults.
pub fn resolve(
    flags: Overrides,
    env: impl Fn(&str) -> Option<String>,
    file: ConfigFile,
) -> anyhow::Result<Settings> {
    let source = flags
        .source
        .or_else(|| env(SOURCE_ENV).map(PathBuf::from))
        .or_else(|| file.source.map(PathBuf::from));
    let Some(source) = source else {
        bail!("no source document: pass --source, set {SOURCE_ENV} or set `source` in the config file");
    };
    let schema = flags
        .schema
        .or_else(|| env(SCHEMA_ENV).map(PathBuf::from))
        .or_else(|| file.schema.map(PathBuf::from));
    let output = flags
        .output
        .or_else(|| env(OUTPUT_ENV).map(PathBuf::from))
        .or_else(|| file.output.map(PathBuf::from));
    let Some(output) = output else {
        bail!("no output: pass --output, set {OUTPUT_ENV} or set `output` in the config file");
    };

    let format = flags.format.or(file.format).unwrap_or_default();
    if format == OutputFormat::Sqlite && output.as_os_str() == STDOUT {
        bail!("SQLite output needs a file path, not standard output");
    }
    let cells = match flags.cells {
        Some(raw) => raw.parse()?,
        None => file.cells.unwrap_or_default(),
    };
    let batch_size = flags
        .batch_size
        .or(file.batch_size)
        .unwrap_or(DEFAULT_BATCH_SIZE);
    if batch_size == 0 {
        bail!("batch size must be at least 1");
    }
    let max_elements = flags.max_elements.or(file.max_elements);

    let passes = match file.passes {
        Some(passes) if !passes.is_empty() => passes
            .iter()
            .map(|p| pass_spec(p, max_elements))
            .collect::<anyhow::Result<Vec<_>>>()?,
        _ => default_passes(max_elements)?,
    };

    Ok(Settings {
        source,
        schema,
        output,
        format,
        cells,
        batch_size,
        passes,
    })
}

fn pass_spec(pass: &PassConfig, max_elements: Option<u64>) -> anyhow::Result<PassSpec> {
    let request = ExtractionRequest::from_names(&pass.entity_types, &pass.features)
        .with_context(|| format!("invalid pass `{}`", pass.table))?
        .with_key(pass.include_key)
        .with_max_elements(max_elements);
    Ok(PassSpec::new(pass.table.clone(), request))
}

/// `articles` and `books` with the classic column sets.
pub fn default_passes(max_elements: Option<u64>) -> Result<Vec<PassSpec>, RequestError> {
    use Feature::*;

    let articles = ExtractionRequest::new(
        [EntityKind::Article],
        vec![
            Title, Pages, Url, Author, Journal, Month, Volume, Publisher, Year, Booktitle,
            Crossref, Editor, Cite, Number, Note, Ee, Cdrom,
        ],
    )?
    .with_key(true)
    .with_max_elements(max_elements);
    let books = ExtractionRequest::new(
        [EntityKind::Book],
        vec![Title, Pages, Url, Volume, Publisher, Year, Booktitle, Series, Editor, Ee],
    )?
    .with_max_elements(max_elements);

    Ok(vec![
        PassSpec::new("articles", articles),
        PassSpec::new("books", books),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn no_env() -> impl Fn(&str) -> Option<String> {
        env_from(&[])
    }

    #[test]
    fn parses_full_config() {
        let toml_str = r#"
source = "/data/dblp.xml.gz"
output = "out.jsonl"
format = "jsonl"
cells = "json"
batch_size = 100

[[pass]]
table = "theses"
entity_types = ["phdthesis", "mastersthesis"]
features = ["title", "school", "year"]
include_key = true
"#;
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(parsed.format, Some(OutputFormat::Jsonl));
        assert_eq!(parsed.cells, Some(CellMode::Json));
        let passes = parsed.passes.as_ref().unwrap();
        assert_eq!(passes.len(), 1);
        assert!(passes[0].include_key);

        let settings = resolve(Overrides::default(), no_env(), parsed).unwrap();
        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.passes.len(), 1);
        assert_eq!(settings.passes[0].table, "theses");
        let names: Vec<_> = settings.passes[0]
            .request
            .columns()
            .iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(names, vec!["key", "title", "school", "year"]);
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            source: Some("/base.xml".into()),
            batch_size: Some(10),
            ..Default::default()
        };
        let overlay = ConfigFile {
            source: Some("/overlay.xml".into()),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        assert_eq!(merged.source.as_deref(), Some("/overlay.xml"));
        assert_eq!(merged.batch_size, Some(10));
    }

    #[test]
    fn flags_beat_env_beat_file() {
        let file = ConfigFile {
            source: Some("/file.xml".into()),
            output: Some("/file.sqlite".into()),
            ..Default::default()
        };
        let env = env_from(&[(SOURCE_ENV, "/env.xml")]);

        let settings = resolve(Overrides::default(), &env, file.clone()).unwrap();
        assert_eq!(settings.source, PathBuf::from("/env.xml"));
        assert_eq!(settings.output, PathBuf::from("/file.sqlite"));

        let flags = Overrides {
            source: Some("/flag.xml".into()),
            ..Default::default()
        };
        let settings = resolve(flags, &env, file).unwrap();
        assert_eq!(settings.source, PathBuf::from("/flag.xml"));
    }

    #[test]
    fn defaults_apply() {
        let flags = Overrides {
            source: Some("dblp.xml".into()),
            output: Some("dblp.sqlite".into()),
            max_elements: Some(18),
            ..Default::default()
        };
        let settings = resolve(flags, no_env(), ConfigFile::default()).unwrap();
        assert_eq!(settings.format, OutputFormat::Sqlite);
        assert_eq!(settings.cells, CellMode::First);
        assert_eq!(settings.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(settings.schema, None);

        let tables: Vec<_> = settings.passes.iter().map(|p| p.table.as_str()).collect();
        assert_eq!(tables, vec!["articles", "books"]);
        assert!(settings.passes[0].request.include_key());
        assert!(!settings.passes[1].request.include_key());
        assert_eq!(settings.passes[0].request.features().len(), 17);
        assert_eq!(settings.passes[1].request.features().len(), 10);
        assert!(settings.passes.iter().all(|p| p.request.max_elements() == Some(18)));
    }

    #[test]
    fn missing_source_or_output_is_an_error() {
        let err = resolve(Overrides::default(), no_env(), ConfigFile::default()).unwrap_err();
        assert!(err.to_string().contains(SOURCE_ENV));

        let flags = Overrides {
            source: Some("dblp.xml".into()),
            ..Default::default()
        };
        let err = resolve(flags, no_env(), ConfigFile::default()).unwrap_err();
        assert!(err.to_string().contains(OUTPUT_ENV));
    }

    #[test]
    fn invalid_values_rejected() {
        let base = Overrides {
            source: Some("dblp.xml".into()),
            output: Some("-".into()),
            ..Default::default()
        };
        assert!(resolve(base.clone(), no_env(), ConfigFile::default()).is_err());

        let jsonl = Overrides {
            format: Some(OutputFormat::Jsonl),
            ..base.clone()
        };
        assert!(resolve(jsonl.clone(), no_env(), ConfigFile::default())
            .unwrap()
            .writes_to_stdout());

        let bad_cells = Overrides {
            cells: Some("csv".into()),
            ..jsonl.clone()
        };
        assert!(resolve(bad_cells, no_env(), ConfigFile::default()).is_err());

        let zero_batch = Overrides {
            batch_size: Some(0),
            ..jsonl
        };
        assert!(resolve(zero_batch, no_env(), ConfigFile::default()).is_err());
    }

    #[test]
    fn unknown_feature_in_pass_rejected() {
        let file = ConfigFile {
            source: Some("dblp.xml".into()),
            output: Some("out.sqlite".into()),
            passes: Some(vec![PassConfig {
                table: "t".into(),
                entity_types: vec!["article".into()],
                features: vec!["abstract".into()],
                include_key: false,
            }]),
            ..Default::default()
        };
        let err = resolve(Overrides::default(), no_env(), file).unwrap_err();
        assert!(format!("{err:#}").contains("abstract"));
    }
}
