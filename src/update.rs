//! Incremental catalog update: add items for rasters that have none
//! yet, then reconcile the collection extent over the full item set.

use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::create::{build_item, list_rasters};
use crate::error::{CatalogError, Result};
use crate::filename::item_id;
use crate::stac::{
    write_document, CatalogUrls, ExtentSummary, ItemDocument, COLLECTION_DIR,
};

/// Outcome of one update run, for CLI reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Items written in this run.
    pub added: usize,
    /// Rasters that already had an item document.
    pub skipped: usize,
}

/// Add items for new rasters to an existing catalog.
///
/// Fails without writing anything when no prior build exists. Per-file
/// extraction failures are warnings, not fatal: the file is neither
/// added nor treated as existing. With `force`, every raster is
/// regenerated and overwritten. Whenever anything is written, every
/// cross-reference link in the tree is rewritten from `repo_url`,
/// existing item documents included. When nothing needs processing, no
/// file is touched.
pub fn update_catalog(
    data_dir: &Path,
    stac_dir: &Path,
    repo_url: &str,
    force: bool,
) -> Result<UpdateSummary> {
    let catalog_path = stac_dir.join("catalog.json");
    let collection_dir = stac_dir.join(COLLECTION_DIR);
    let collection_path = collection_dir.join("collection.json");
    if !catalog_path.is_file() || !collection_path.is_file() {
        return Err(CatalogError::MissingCatalog(stac_dir.to_path_buf()));
    }

    let urls = CatalogUrls::from_repo_url(repo_url);

    // Trust the item documents on disk, not the collection's link
    // list, which could be stale.
    let existing: BTreeSet<String> = if force {
        info!("force mode: regenerating all items");
        BTreeSet::new()
    } else {
        load_items(&collection_dir)?
            .into_iter()
            .map(|item| item.id)
            .collect()
    };
    info!("{} existing items in catalog", existing.len());

    let files = list_rasters(data_dir)?;
    info!("found {} raster files in {:?}", files.len(), data_dir);

    let mut new_items = Vec::new();
    let mut skipped = 0usize;
    for path in &files {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let id = match item_id(file_name) {
            Ok(id) => id,
            Err(e) => {
                warn!("skipping {:?}: {e}", path);
                continue;
            }
        };
        if existing.contains(id) {
            skipped += 1;
            continue;
        }
        match build_item(path, &urls) {
            Ok(item) => {
                info!("created item {}", item.id);
                new_items.push(item);
            }
            Err(e) => warn!("skipping {:?}: {e}", path),
        }
    }

    if new_items.is_empty() && !force {
        info!("no new items; catalog is up to date");
        return Ok(UpdateSummary { added: 0, skipped });
    }

    let added = new_items.len();
    for item in &new_items {
        let path = collection_dir
            .join(&item.id)
            .join(format!("{}.json", item.id));
        write_document(&path, &item.document)?;
    }

    let refreshed = rewrite_item_links(&collection_dir, &urls)?;
    if refreshed > 0 {
        info!("rewrote links in {refreshed} existing item documents");
    }
    reconcile_collection(&collection_path, &collection_dir, &urls)?;
    rewrite_catalog(&catalog_path, &collection_path, &urls)?;

    info!("catalog updated: {added} added, {skipped} existing");
    Ok(UpdateSummary { added, skipped })
}

/// All parseable item documents under the collection directory.
/// Unreadable or malformed documents are reported and skipped, never
/// silently swallowed.
fn load_items(collection_dir: &Path) -> Result<Vec<ItemDocument>> {
    let mut items = Vec::new();
    for path in find_item_files(collection_dir)? {
        let parsed = fs::read_to_string(&path)
            .map_err(CatalogError::from)
            .and_then(|text| serde_json::from_str::<ItemDocument>(&text).map_err(CatalogError::from));
        match parsed {
            Ok(item) => items.push(item),
            Err(e) => warn!("could not read item document {:?}: {e}", path),
        }
    }
    Ok(items)
}

/// Item document files under `dir`: every `SIF_*.json`, at any depth,
/// excluding `collection.json` itself.
fn find_item_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if name.starts_with("SIF_") && name.ends_with(".json") {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Rewrite the cross-reference links and the data asset href of every
/// item document under `collection_dir` from `urls`, so that the whole
/// tree agrees with the configured base after an update. Documents
/// that already match are not touched. Returns how many were
/// rewritten.
fn rewrite_item_links(collection_dir: &Path, urls: &CatalogUrls) -> Result<usize> {
    let mut rewritten = 0;
    for path in find_item_files(collection_dir)? {
        let parsed = fs::read_to_string(&path)
            .map_err(CatalogError::from)
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(CatalogError::from));
        let mut item = match parsed {
            Ok(item) => item,
            Err(e) => {
                warn!("could not read item document {:?}: {e}", path);
                continue;
            }
        };
        let id = match item.get("id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => {
                warn!("item document {:?} has no id field", path);
                continue;
            }
        };

        let links = json!([
            { "rel": "self", "href": urls.item_href(&id), "type": "application/geo+json" },
            { "rel": "collection", "href": urls.collection_href(), "type": "application/json" },
            { "rel": "parent", "href": urls.collection_href(), "type": "application/json" },
            { "rel": "root", "href": urls.catalog_href(), "type": "application/json" },
        ]);
        let asset_href = Value::String(urls.asset_href(&format!("{id}.tif")));

        if item["links"] == links && item["assets"]["data"]["href"] == asset_href {
            continue;
        }
        item["links"] = links;
        if item["assets"]["data"].is_object() {
            item["assets"]["data"]["href"] = asset_href;
        }
        write_document(&path, &item)?;
        rewritten += 1;
    }
    Ok(rewritten)
}

/// Recompute the collection's aggregate extent from scratch over the
/// current on-disk item set and rebuild its link list. The extent is a
/// pure function of the item set; a stale value here is a bug.
fn reconcile_collection(
    collection_path: &Path,
    collection_dir: &Path,
    urls: &CatalogUrls,
) -> Result<()> {
    let mut collection: Value = serde_json::from_str(&fs::read_to_string(collection_path)?)?;

    let items = load_items(collection_dir)?;
    let bboxes: Vec<[f64; 4]> = items.iter().map(|i| i.bbox).collect();
    let datetimes: Vec<_> = items.iter().map(|i| i.properties.datetime).collect();
    let extent = ExtentSummary::aggregate(&bboxes, &datetimes)
        .ok_or_else(|| CatalogError::NoInputFiles(collection_dir.to_path_buf()))?;

    let [min_lon, min_lat, max_lon, max_lat] = extent.bbox;
    let start = extent.start.to_rfc3339();
    let end = extent.end.to_rfc3339();

    collection["extent"]["spatial"]["bbox"] =
        json!([[min_lon, min_lat, max_lon, max_lat]]);
    collection["extent"]["temporal"]["interval"] = json!([[&start, &end]]);

    if let Some(dims) = collection.get_mut("cube:dimensions") {
        if dims.get("x").is_some() {
            dims["x"]["extent"] = json!([min_lon, max_lon]);
        }
        if dims.get("y").is_some() {
            dims["y"]["extent"] = json!([min_lat, max_lat]);
        }
        if dims.get("t").is_some() {
            dims["t"]["extent"] = json!([&start, &end]);
        }
    }

    let mut ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    ids.sort_unstable();
    let mut links = vec![
        json!({ "rel": "self", "href": urls.collection_href(), "type": "application/json" }),
        json!({ "rel": "root", "href": urls.catalog_href(), "type": "application/json" }),
        json!({ "rel": "parent", "href": urls.catalog_href(), "type": "application/json" }),
    ];
    for id in ids {
        links.push(json!({
            "rel": "item",
            "href": urls.item_href(id),
            "type": "application/geo+json",
        }));
    }
    collection["links"] = Value::Array(links);

    write_document(collection_path, &collection)?;
    info!(
        "updated collection extent over {} items: [{min_lon:.2}, {min_lat:.2}, {max_lon:.2}, {max_lat:.2}], {start} to {end}",
        items.len()
    );
    Ok(())
}

/// Rewrite the root catalog's links from the configured base URL.
fn rewrite_catalog(catalog_path: &Path, collection_path: &Path, urls: &CatalogUrls) -> Result<()> {
    let mut catalog: Value = serde_json::from_str(&fs::read_to_string(catalog_path)?)?;
    let collection: Value = serde_json::from_str(&fs::read_to_string(collection_path)?)?;

    catalog["links"] = json!([
        { "rel": "self", "href": urls.catalog_href(), "type": "application/json" },
        { "rel": "root", "href": urls.catalog_href(), "type": "application/json" },
        {
            "rel": "child",
            "href": urls.collection_href(),
            "type": "application/json",
            "title": collection.get("title").cloned().unwrap_or(Value::Null),
        },
    ]);

    write_document(catalog_path, &catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_value(id: &str, bbox: [f64; 4], datetime: &str) -> Value {
        json!({
            "type": "Feature",
            "id": id,
            "bbox": bbox,
            "properties": { "datetime": datetime },
        })
    }

    #[test]
    fn missing_catalog_is_fatal_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let stac_dir = dir.path().join("stac");
        assert!(matches!(
            update_catalog(dir.path(), &stac_dir, "https://github.com/a/b", false),
            Err(CatalogError::MissingCatalog(_))
        ));
        assert!(!stac_dir.exists());
    }

    #[test]
    fn item_scan_skips_collection_json_and_unparseable_files() {
        let dir = tempfile::tempdir().unwrap();
        let coll = dir.path().join(COLLECTION_DIR);

        write_document(
            &coll.join("collection.json"),
            &json!({ "type": "Collection" }),
        )
        .unwrap();
        write_document(
            &coll.join("SIF_20230701").join("SIF_20230701.json"),
            &item_value("SIF_20230701", [10.0, 20.0, 11.0, 21.0], "2023-07-01T00:00:00+00:00"),
        )
        .unwrap();
        write_document(
            &coll.join("SIF_20230702").join("SIF_20230702.json"),
            &item_value("SIF_20230702", [10.5, 19.0, 11.5, 20.0], "2023-07-02T00:00:00+00:00"),
        )
        .unwrap();
        // A corrupt item document must produce a warning, not an abort.
        fs::create_dir_all(coll.join("SIF_20230703")).unwrap();
        fs::write(coll.join("SIF_20230703").join("SIF_20230703.json"), "{ not json").unwrap();

        let items = load_items(&coll).unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["SIF_20230701", "SIF_20230702"]);
    }

    #[test]
    fn item_link_rewrite_moves_hrefs_to_the_new_base_once() {
        let dir = tempfile::tempdir().unwrap();
        let coll = dir.path().join(COLLECTION_DIR);
        let old = CatalogUrls::from_repo_url("https://github.com/a/old");
        let new = CatalogUrls::from_repo_url("https://github.com/a/new");

        write_document(
            &coll.join("SIF_20230701").join("SIF_20230701.json"),
            &json!({
                "type": "Feature",
                "id": "SIF_20230701",
                "bbox": [10.0, 20.0, 11.0, 21.0],
                "properties": { "datetime": "2023-07-01T00:00:00+00:00" },
                "assets": {
                    "data": {
                        "href": old.asset_href("SIF_20230701.tif"),
                        "type": "image/tiff; application=geotiff",
                    }
                },
                "links": [
                    { "rel": "self", "href": old.item_href("SIF_20230701"), "type": "application/geo+json" },
                    { "rel": "collection", "href": old.collection_href(), "type": "application/json" },
                    { "rel": "parent", "href": old.collection_href(), "type": "application/json" },
                    { "rel": "root", "href": old.catalog_href(), "type": "application/json" },
                ],
            }),
        )
        .unwrap();

        assert_eq!(rewrite_item_links(&coll, &new).unwrap(), 1);

        let item: Value = serde_json::from_str(
            &fs::read_to_string(coll.join("SIF_20230701/SIF_20230701.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(
            item["assets"]["data"]["href"],
            "https://raw.githubusercontent.com/a/new/main/data/SIF_20230701.tif"
        );
        // Non-href asset fields survive the rewrite.
        assert_eq!(item["assets"]["data"]["type"], "image/tiff; application=geotiff");
        for link in item["links"].as_array().unwrap() {
            assert!(link["href"]
                .as_str()
                .unwrap()
                .starts_with("https://raw.githubusercontent.com/a/new/"));
        }

        // A second pass finds everything up to date and writes nothing.
        assert_eq!(rewrite_item_links(&coll, &new).unwrap(), 0);
    }

    #[test]
    fn reconcile_recomputes_extent_and_item_links() {
        let dir = tempfile::tempdir().unwrap();
        let coll = dir.path().join(COLLECTION_DIR);
        let urls = CatalogUrls::from_repo_url("https://github.com/a/b");

        write_document(
            &coll.join("collection.json"),
            &json!({
                "type": "Collection",
                "title": "SIF July 2023",
                "cube:dimensions": {
                    "x": { "extent": [0.0, 0.0] },
                    "y": { "extent": [0.0, 0.0] },
                    "t": { "extent": ["", ""] },
                },
                "extent": {
                    "spatial": { "bbox": [[0.0, 0.0, 0.0, 0.0]] },
                    "temporal": { "interval": [["", ""]] },
                },
                "links": [],
            }),
        )
        .unwrap();
        write_document(
            &coll.join("SIF_20230702").join("SIF_20230702.json"),
            &item_value("SIF_20230702", [10.5, 19.0, 11.5, 20.0], "2023-07-02T00:00:00+00:00"),
        )
        .unwrap();
        write_document(
            &coll.join("SIF_20230701").join("SIF_20230701.json"),
            &item_value("SIF_20230701", [10.0, 20.0, 11.0, 21.0], "2023-07-01T00:00:00+00:00"),
        )
        .unwrap();

        reconcile_collection(&coll.join("collection.json"), &coll, &urls).unwrap();

        let collection: Value =
            serde_json::from_str(&fs::read_to_string(coll.join("collection.json")).unwrap())
                .unwrap();
        assert_eq!(
            collection["extent"]["spatial"]["bbox"],
            json!([[10.0, 19.0, 11.5, 21.0]])
        );
        assert_eq!(
            collection["extent"]["temporal"]["interval"],
            json!([["2023-07-01T00:00:00+00:00", "2023-07-02T00:00:00+00:00"]])
        );
        assert_eq!(collection["cube:dimensions"]["x"]["extent"], json!([10.0, 11.5]));
        assert_eq!(collection["cube:dimensions"]["t"]["extent"][1], "2023-07-02T00:00:00+00:00");

        let item_links: Vec<&str> = collection["links"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|l| l["rel"] == "item")
            .map(|l| l["href"].as_str().unwrap())
            .collect();
        assert_eq!(item_links.len(), 2);
        assert!(item_links[0].contains("SIF_20230701"));
        assert!(item_links[1].contains("SIF_20230702"));
    }
}
