//! Catalog builder: full three-level document tree from a data
//! directory.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{CatalogError, Result};
use crate::filename::{item_id, matches_contract, parse_date};
use crate::raster;
use crate::stac::{
    catalog_document, collection_document, item_document, write_document, CatalogUrls,
    ExtentSummary, COLLECTION_DIR,
};

/// Explicit invocation parameters; there is no process-wide
/// configuration state.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub repo_url: String,
    pub collection_title: String,
    pub collection_description: String,
}

/// What a build produced, for CLI reporting.
#[derive(Debug, Clone)]
pub struct CatalogSummary {
    pub items: usize,
    pub extent: ExtentSummary,
}

/// Enumerate raster files in `data_dir` that follow the naming
/// contract, in lexicographic (= chronological) order. Anything else
/// in the directory is ignored.
pub fn list_rasters(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(data_dir)? {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if path.is_file() && matches_contract(name) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// One fully constructed item, plus the values the extent aggregation
/// needs.
pub(crate) struct BuiltItem {
    pub id: String,
    pub document: Value,
    pub bbox: [f64; 4],
    pub datetime: DateTime<Utc>,
}

/// Extract metadata for one raster and build its item document.
/// Shared between the builder and the updater.
pub(crate) fn build_item(path: &Path, urls: &CatalogUrls) -> Result<BuiltItem> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CatalogError::MalformedFilename(path.display().to_string()))?;

    let id = item_id(file_name)?.to_string();
    let datetime = parse_date(file_name)?;
    let meta = raster::extract(path)?;
    let document = item_document(file_name, &id, &meta, datetime, urls);

    Ok(BuiltItem {
        id,
        document,
        bbox: meta.bbox,
        datetime,
    })
}

/// Build the complete catalog tree under `config.output_dir`.
///
/// Fatal on the first malformed filename or unreadable raster: the
/// builder has no partial-success mode. Output is deterministic, so a
/// re-run over unchanged input writes byte-identical documents.
pub fn create_catalog(config: &CatalogConfig) -> Result<CatalogSummary> {
    let urls = CatalogUrls::from_repo_url(&config.repo_url);

    let files = list_rasters(&config.data_dir)?;
    if files.is_empty() {
        return Err(CatalogError::NoInputFiles(config.data_dir.clone()));
    }
    info!("found {} raster files in {:?}", files.len(), config.data_dir);

    let mut items = Vec::with_capacity(files.len());
    let mut representative = None;
    for path in &files {
        debug!("extracting {:?}", path);
        // Descriptive dimension metadata (EPSG code, step) comes from
        // the first file.
        if representative.is_none() {
            let meta = raster::extract(path)?;
            representative = Some((meta.epsg_code().unwrap_or(4326), meta.transform[0].abs()));
        }
        items.push(build_item(path, &urls)?);
    }

    let bboxes: Vec<[f64; 4]> = items.iter().map(|i| i.bbox).collect();
    let datetimes: Vec<DateTime<Utc>> = items.iter().map(|i| i.datetime).collect();
    let extent = ExtentSummary::aggregate(&bboxes, &datetimes)
        .ok_or_else(|| CatalogError::NoInputFiles(config.data_dir.clone()))?;
    let (epsg, step) = representative
        .ok_or_else(|| CatalogError::NoInputFiles(config.data_dir.clone()))?;

    let collection_dir = config.output_dir.join(COLLECTION_DIR);
    for item in &items {
        let path = collection_dir
            .join(&item.id)
            .join(format!("{}.json", item.id));
        write_document(&path, &item.document)?;
    }

    let item_ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
    let collection = collection_document(
        &urls,
        &config.collection_title,
        &config.collection_description,
        epsg,
        step,
        &extent,
        &item_ids,
    );
    write_document(&collection_dir.join("collection.json"), &collection)?;

    let catalog = catalog_document(&urls, &config.collection_title);
    write_document(&config.output_dir.join("catalog.json"), &catalog)?;

    info!(
        "wrote catalog with {} items to {:?}",
        items.len(),
        config.output_dir
    );
    Ok(CatalogSummary {
        items: items.len(),
        extent,
    })
}
