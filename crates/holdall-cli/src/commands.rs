use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use holdall_containers::{Contained, ContainedRecord, ContainerStore, CONTAINED, ITEMS};
use holdall_externalize::{
    Adapter, ExternalMap, ExternalValue, Externalizable, ExternalizationConfig, ExternalizeCall,
    Externalizer, JsonEncoder, NtiidGenerator, Registry, BROKEN_OBJECT,
};
use holdall_types::fields::{CLASS, CREATED_TIME, ID, LINKS, MIMETYPE, NTIID};
use holdall_types::is_synthetic_key;
use tracing::debug;

use crate::cli::{Cli, Command, ConfigArgs, IngestArgs, OutputFormat};
use crate::config::HoldallConfig;

/// Adapter name rendering stored objects by their synthetic fields only.
pub const SUMMARY: &str = "summary";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let output = match cli.command {
        Command::Ingest(args) => cmd_ingest(&args)?,
        Command::Config(args) => cmd_config(&args)?,
    };
    print!("{output}");
    Ok(())
}

struct SummaryAdapter;

impl Adapter for SummaryAdapter {
    fn adapt(&self, obj: &dyn Externalizable, call: &mut ExternalizeCall<'_>) -> ExternalValue {
        ExternalValue::Map(call.to_external_dictionary(obj, None))
    }
}

fn externalizer(config: &ExternalizationConfig) -> Externalizer {
    let mut registry = Registry::standard(config);
    registry.register_adapter(CONTAINED, SUMMARY, Arc::new(SummaryAdapter));
    Externalizer::new(Arc::new(registry), config.clone())
}

fn read_records(path: &Path) -> anyhow::Result<Vec<ExternalMap>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading records {}", path.display()))?;
    let parsed: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing records {}", path.display()))?;
    let serde_json::Value::Array(records) = parsed else {
        bail!("{}: expected a JSON array of records", path.display());
    };
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| match ExternalValue::from(record) {
            ExternalValue::Map(map) => Ok(map),
            _ => bail!("record {index} is not a JSON object"),
        })
        .collect()
}

fn cmd_ingest(args: &IngestArgs) -> anyhow::Result<String> {
    let config = HoldallConfig::load(args.config.as_deref())?;
    let mut store = ContainerStore::new(config.store.clone()).with_id_generator(Arc::new(
        NtiidGenerator::from_config(&config.externalization),
    ));

    for (index, data) in read_records(&args.records)?.into_iter().enumerate() {
        let record: Arc<dyn Contained> = Arc::new(
            ContainedRecord::from_external(data).with_context(|| format!("record {index}"))?,
        );
        let added = store
            .add_contained_object(record)
            .with_context(|| format!("adding record {index}"))?;
        debug!(
            index,
            container = ?added.meta().container_id(),
            id = ?added.meta().id(),
            "ingested record"
        );
    }
    store.commit().context("committing store")?;

    let externalizer = externalizer(&config.externalization);
    match args.format {
        OutputFormat::Json => {
            let encoded = externalizer.to_external_representation(
                &store,
                &JsonEncoder::pretty(),
                &args.adapter,
            )?;
            Ok(format!("{encoded}\n"))
        }
        OutputFormat::Text => Ok(render_text(
            &externalizer.externalize_with_name(&store, &args.adapter),
        )),
    }
}

fn cmd_config(args: &ConfigArgs) -> anyhow::Result<String> {
    HoldallConfig::load(args.config.as_deref())?.to_toml()
}

fn render_text(store: &ExternalValue) -> String {
    let containers = store
        .as_map()
        .and_then(|m| m.get(ITEMS))
        .and_then(ExternalValue::as_map)
        .filter(|m| !m.is_empty());
    let Some(containers) = containers else {
        return "Store is empty.\n".to_string();
    };

    let mut out = String::new();
    for (container_id, view) in containers.iter() {
        let items: Vec<&ExternalValue> = match view.as_map().and_then(|m| m.get(ITEMS)) {
            Some(ExternalValue::Map(m)) => m.values().collect(),
            Some(ExternalValue::List(l)) => l.iter().collect(),
            _ => Vec::new(),
        };
        out.push_str(&format!("{} ({} items)\n", container_id.bold(), items.len()));
        for item in items {
            out.push_str(&format!("  {}\n", describe_item(item)));
        }
    }
    out
}

/// Keys the externalizer derives from an object's attributes.
const DERIVED_KEYS: &[&str] = &[NTIID, MIMETYPE, CREATED_TIME, LINKS];

fn describe_item(item: &ExternalValue) -> String {
    match item {
        ExternalValue::Null => "(missing)".dimmed().to_string(),
        ExternalValue::String(s) if s == BROKEN_OBJECT => s.red().to_string(),
        ExternalValue::Map(map) => {
            let id = map.get(ID).and_then(ExternalValue::as_str).unwrap_or("-");
            let class = map.get(CLASS).and_then(ExternalValue::as_str).unwrap_or("Object");
            let fields: Vec<String> = map
                .iter()
                .filter(|(k, _)| !is_synthetic_key(k) && !DERIVED_KEYS.contains(&k.as_str()))
                .map(|(k, v)| format!("{k}={}", serde_json::to_string(v).unwrap_or_default()))
                .collect();
            if fields.is_empty() {
                format!("{} {}", id.yellow(), class.cyan())
            } else {
                format!("{} {} {}", id.yellow(), class.cyan(), fields.join(" "))
            }
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    fn write_file(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        path
    }

    fn ingest(records: PathBuf, config: Option<PathBuf>, adapter: &str) -> serde_json::Value {
        let args = IngestArgs {
            records,
            config,
            adapter: adapter.to_string(),
            format: OutputFormat::Json,
        };
        serde_json::from_str(&cmd_ingest(&args).unwrap()).unwrap()
    }

    const NOTES: &str = r#"[
        {"Class": "Note", "ContainerId": "notes", "ID": "n1", "body": "hello"},
        {"Class": "Note", "ContainerId": "notes", "ID": "n2", "body": "world"},
        {"Class": "Highlight", "ContainerId": "highlights", "ID": "h1"}
    ]"#;

    // -----------------------------------------------------------------------
    // ingest
    // -----------------------------------------------------------------------

    #[test]
    fn ingest_renders_containers_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let records = write_file(&dir, "records.json", NOTES);
        let out = ingest(records, None, "");

        assert_eq!(out["Class"], "ContainerStore");
        let notes = &out["Items"]["notes"]["Items"];
        assert_eq!(notes.as_object().unwrap().len(), 2);
        assert_eq!(notes["n1"]["body"], "hello");
        assert_eq!(notes["n2"]["MimeType"], "application/vnd.holdall.note");
        assert_eq!(out["Items"]["highlights"]["Items"]["h1"]["Class"], "Highlight");
    }

    #[test]
    fn summary_adapter_drops_plain_fields() {
        let dir = tempfile::tempdir().unwrap();
        let records = write_file(&dir, "records.json", NOTES);
        let out = ingest(records, None, SUMMARY);

        let n1 = &out["Items"]["notes"]["Items"]["n1"];
        assert_eq!(n1["ID"], "n1");
        assert_eq!(n1["Class"], "Note");
        assert!(n1.get("body").is_none());
    }

    #[test]
    fn sequential_config_renders_lists() {
        let dir = tempfile::tempdir().unwrap();
        let records = write_file(&dir, "records.json", NOTES);
        let config = write_file(&dir, "holdall.toml", "[store]\ncontainer_kind = \"sequential\"\n");
        let out = ingest(records, Some(config), "");

        let notes = out["Items"]["notes"]["Items"].as_array().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1]["body"], "world");
    }

    #[test]
    fn text_output_lists_each_container() {
        let dir = tempfile::tempdir().unwrap();
        let records = write_file(&dir, "records.json", NOTES);
        let args = IngestArgs {
            records,
            config: None,
            adapter: String::new(),
            format: OutputFormat::Text,
        };
        let out = cmd_ingest(&args).unwrap();
        assert!(out.contains("notes"));
        assert!(out.contains("(2 items)"));
        assert!(out.contains("body=\"hello\""));
        assert!(out.contains("highlights"));
    }

    #[test]
    fn empty_record_list_renders_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let records = write_file(&dir, "records.json", "[]");
        let args = IngestArgs {
            records,
            config: None,
            adapter: String::new(),
            format: OutputFormat::Text,
        };
        assert_eq!(cmd_ingest(&args).unwrap(), "Store is empty.\n");
    }

    #[test]
    fn record_without_container_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let records = write_file(&dir, "records.json", r#"[{"Class": "Note"}]"#);
        let args = IngestArgs {
            records,
            config: None,
            adapter: String::new(),
            format: OutputFormat::Json,
        };
        let err = cmd_ingest(&args).unwrap_err();
        assert!(err.to_string().contains("record 0"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let records = write_file(
            &dir,
            "records.json",
            r#"[
                {"Class": "Note", "ContainerId": "notes", "ID": "n1"},
                {"Class": "Note", "ContainerId": "notes", "ID": "n1"}
            ]"#,
        );
        let args = IngestArgs {
            records,
            config: None,
            adapter: String::new(),
            format: OutputFormat::Json,
        };
        let err = cmd_ingest(&args).unwrap_err();
        assert!(err.to_string().contains("adding record 1"));
    }

    #[test]
    fn non_array_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let records = write_file(&dir, "records.json", r#"{"Class": "Note"}"#);
        assert!(read_records(&records).is_err());
        let records = write_file(&dir, "mixed.json", r#"[{"Class": "Note"}, 3]"#);
        let err = read_records(&records).unwrap_err();
        assert!(err.to_string().contains("record 1"));
    }

    // -----------------------------------------------------------------------
    // config
    // -----------------------------------------------------------------------

    #[test]
    fn config_prints_effective_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_file(&dir, "holdall.toml", "[externalization]\nmax_depth = 5\n");
        let out = cmd_config(&ConfigArgs { config: Some(config) }).unwrap();
        assert!(out.contains("[store]"));
        assert!(out.contains("max_depth = 5"));
    }

    #[test]
    fn describes_dead_and_broken_items() {
        assert!(describe_item(&ExternalValue::Null).contains("(missing)"));
        assert!(describe_item(&ExternalValue::from(BROKEN_OBJECT)).contains(BROKEN_OBJECT));
    }
}
