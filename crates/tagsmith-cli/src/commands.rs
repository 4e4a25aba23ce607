use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tagsmith_layout::{TagDump, TagHeader, TagSerial, WritePassword, TOTAL_PAGES};
use tagsmith_session::test_harness::{
    run_simulation, PassthroughLoader, SimulatedReader, SimulatedTag, SimulatorConfig,
};
use tagsmith_session::{ScanOutcome, StoreConfig, StoreSnapshot, TagStore};

/// Config file first, then `--root` on top
pub(crate) fn load_config(path: Option<&Path>, root: Option<PathBuf>) -> Result<StoreConfig> {
    let config = match path {
        Some(path) => StoreConfig::from_toml_file(path)?,
        None => StoreConfig::new(),
    };
    Ok(match root {
        Some(root) => config.with_root_dir(root),
        None => config,
    })
}

pub(crate) fn password(serial: &str) -> Result<()> {
    let serial = parse_serial(serial)?;
    let pwd = WritePassword::derive(&serial);
    println!("{}", hex::encode(pwd.as_page()));
    Ok(())
}

pub(crate) async fn inspect(path: &Path, pages: bool) -> Result<()> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Couldn't read {}", path.display()))?;
    let dump = TagDump::from_bytes(raw)?;
    let header = TagHeader::parse(&dump.as_bytes()[..16])?;

    println!("File:      {}", path.display());
    println!("Class:     {}", header.tag_class());
    println!("UID:       {}", header.uid());
    println!("Character: {}", hex::encode(dump.character_id()));

    if pages {
        println!();
        for page in 0..TOTAL_PAGES {
            println!("  {page:3}: {}", hex::encode(dump.page(page)?));
        }
    }
    Ok(())
}

/// Returns whether the image was written in full
pub(crate) async fn simulate(
    config: StoreConfig,
    figure: Option<&Path>,
    serial: &str,
    fail_at: Option<u8>,
    size_byte: &str,
) -> Result<bool> {
    let serial = parse_serial(serial)?;
    let size_byte = u8::from_str_radix(size_byte.trim_start_matches("0x"), 16)
        .with_context(|| format!("invalid size byte: {size_byte}"))?;

    tracing::info!(%serial, size_byte, ?fail_at, figure = ?figure, "starting simulation");
    println!("Running tag simulator...");
    println!("Serial: {serial}");
    println!();

    let Some(figure) = figure else {
        let report = run_simulation(SimulatorConfig {
            serial,
            size_byte,
            fail_write_at: fail_at,
            ..SimulatorConfig::default()
        })
        .await?;
        tracing::info!(
            passed = report.passed(),
            pages = report.written_pages.len(),
            "simulation finished"
        );
        print_snapshot(&report.snapshot);
        println!("Pages written: {}", report.written_pages.len());
        if let Err(e) = &report.outcome {
            println!("Result: {e}");
        }
        return Ok(report.passed());
    };

    let tag = SimulatedTag::ntag215(serial).with_size_byte(size_byte);
    let tag = match fail_at {
        Some(page) => tag.failing_write_at(page),
        None => tag,
    };
    let tag = tag.shared();
    let store = TagStore::new(
        config,
        Arc::new(SimulatedReader::with_tag(Arc::clone(&tag))),
        Arc::new(PassthroughLoader),
    );

    let item = if figure.is_absolute() {
        figure.to_path_buf()
    } else {
        store.config().root_dir.join(figure)
    };
    let result = store.tap(&item).await;
    tracing::info!(item = %item.display(), ok = result.is_ok(), "simulation finished");
    print_snapshot(&store.snapshot());
    println!("Pages written: {}", tag.lock().written_pages().len());

    match result {
        Ok(ScanOutcome::Written { uid, .. }) => {
            println!("Result: written, UID {uid}");
            Ok(true)
        }
        Ok(ScanOutcome::Skipped) => bail!("{} is not a figure image", item.display()),
        Ok(other) => {
            println!("Result: {other:?}");
            Ok(false)
        }
        Err(e) => {
            println!("Result: {e}");
            Ok(false)
        }
    }
}

fn print_snapshot(snapshot: &StoreSnapshot) {
    println!("Progress: {:.0}%", snapshot.progress() * 100.0);
    if let Some(error) = snapshot.error() {
        println!("Error: {error}");
    }
}

fn parse_serial(text: &str) -> Result<TagSerial> {
    let bytes = hex::decode(text).with_context(|| format!("invalid serial: {text}"))?;
    Ok(TagSerial::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_must_be_seven_bytes() {
        assert!(parse_serial("04112233445566").is_ok());
        assert!(parse_serial("0411223344").is_err());
        assert!(parse_serial("zz").is_err());
    }

    #[test]
    fn root_overrides_config() {
        let config = load_config(None, Some(PathBuf::from("/srv/figures"))).unwrap();
        assert_eq!(config.key_path(), PathBuf::from("/srv/figures/key.bin"));
    }

    #[tokio::test]
    async fn simulate_blank_image() {
        let config = StoreConfig::new();
        assert!(simulate(config.clone(), None, "04112233445566", None, "3e")
            .await
            .unwrap());
        assert!(!simulate(config, None, "04112233445566", Some(40), "0x3e")
            .await
            .unwrap());
    }
}
