//! STAC document construction.
//!
//! Documents are built as `serde_json::Value` trees in the
//! CDSE-compatible layout the collection is consumed with: a legacy
//! `0.9.0` version tag, datacube + eo extensions on the collection,
//! and eo + projection extensions on items. No document carries a
//! generation timestamp, so rebuilding over unchanged input is
//! byte-identical.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::raster::RasterMetadata;

pub const STAC_VERSION: &str = "0.9.0";
pub const CATALOG_ID: &str = "sif-catalog";
pub const COLLECTION_ID: &str = "SIF_COLLECTION";
pub const COLLECTION_DIR: &str = "sif-collection";

pub const CATALOG_TITLE: &str = "SIF Data Catalog";
pub const CATALOG_DESCRIPTION: &str =
    "STAC Catalog for Solar-Induced Fluorescence (SIF) data";

/// Fixed descriptor of the single SIF band.
pub const BAND_NAME: &str = "SIF";
pub const BAND_CENTER_WAVELENGTH: f64 = 0.740;
pub const BAND_FWHM: f64 = 0.040;
pub const BAND_UNIT: &str = "W/m²/sr/μm";

/// Degrees→meters factor for the descriptive ground-sample distance.
/// Only approximately valid near the equator; kept as-is because the
/// value is documentation, not geometry.
pub const DEGREES_TO_METERS: f64 = 111_000.0;

const MEDIA_JSON: &str = "application/json";
const MEDIA_GEOJSON: &str = "application/geo+json";
const MEDIA_GEOTIFF: &str = "image/tiff; application=geotiff";

const EXT_EO: &str = "https://stac-extensions.github.io/eo/v1.1.0/schema.json";
const EXT_PROJECTION: &str =
    "https://stac-extensions.github.io/projection/v1.1.0/schema.json";
const EXT_DATACUBE: &str =
    "https://stac-extensions.github.io/datacube/v2.2.0/schema.json";

/// The two independent base URLs the catalog links against: one for
/// the STAC documents themselves, one for the raw raster bytes.
#[derive(Debug, Clone)]
pub struct CatalogUrls {
    pub stac_base: String,
    pub asset_base: String,
}

impl CatalogUrls {
    /// Derive both bases from a GitHub repository URL by switching to
    /// the raw-content domain.
    pub fn from_repo_url(repo_url: &str) -> Self {
        let raw = repo_url
            .replace("https://github.com/", "https://raw.githubusercontent.com/");
        let raw = raw.trim_end_matches('/');
        CatalogUrls {
            stac_base: format!("{raw}/main/stac"),
            asset_base: format!("{raw}/main/data"),
        }
    }

    pub fn catalog_href(&self) -> String {
        format!("{}/catalog.json", self.stac_base)
    }

    pub fn collection_href(&self) -> String {
        format!("{}/{COLLECTION_DIR}/collection.json", self.stac_base)
    }

    pub fn item_href(&self, item_id: &str) -> String {
        format!("{}/{COLLECTION_DIR}/{item_id}/{item_id}.json", self.stac_base)
    }

    pub fn asset_href(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.asset_base)
    }
}

/// Aggregate spatial/temporal extent over a set of items.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtentSummary {
    pub bbox: [f64; 4],
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ExtentSummary {
    /// Union bbox and `[min, max]` interval over per-item values.
    /// Order-independent; empty input yields `None`.
    pub fn aggregate(bboxes: &[[f64; 4]], datetimes: &[DateTime<Utc>]) -> Option<Self> {
        let first = *datetimes.first()?;
        if bboxes.is_empty() {
            return None;
        }
        let bbox = [
            bboxes.iter().map(|b| b[0]).fold(f64::INFINITY, f64::min),
            bboxes.iter().map(|b| b[1]).fold(f64::INFINITY, f64::min),
            bboxes.iter().map(|b| b[2]).fold(f64::NEG_INFINITY, f64::max),
            bboxes.iter().map(|b| b[3]).fold(f64::NEG_INFINITY, f64::max),
        ];
        let (start, end) = datetimes
            .iter()
            .fold((first, first), |(lo, hi), &dt| (lo.min(dt), hi.max(dt)));
        Some(ExtentSummary { bbox, start, end })
    }
}

/// Build one STAC item for a raster file.
pub fn item_document(
    file_name: &str,
    item_id: &str,
    meta: &RasterMetadata,
    datetime: DateTime<Utc>,
    urls: &CatalogUrls,
) -> Value {
    let mut properties = json!({
        "datetime": datetime.to_rfc3339(),
        "eo:bands": [
            {
                "name": BAND_NAME,
                "center_wavelength": BAND_CENTER_WAVELENGTH,
                "full_width_half_max": BAND_FWHM,
            }
        ],
        "proj:shape": [meta.shape.0, meta.shape.1],
        "proj:transform": meta.transform,
    });
    if let Some(code) = meta.epsg_code() {
        properties["proj:epsg"] = json!(code);
    }

    json!({
        "type": "Feature",
        "stac_version": STAC_VERSION,
        "stac_extensions": [EXT_EO, EXT_PROJECTION],
        "id": item_id,
        "geometry": meta.geometry.clone(),
        "bbox": meta.bbox,
        "properties": properties,
        "assets": {
            "data": {
                "href": urls.asset_href(file_name),
                "type": MEDIA_GEOTIFF,
                "roles": ["data"],
                "title": "SIF GeoTIFF",
                "eo:bands": [0],
            }
        },
        "links": [
            { "rel": "self", "href": urls.item_href(item_id), "type": MEDIA_GEOJSON },
            { "rel": "collection", "href": urls.collection_href(), "type": MEDIA_JSON },
            { "rel": "parent", "href": urls.collection_href(), "type": MEDIA_JSON },
            { "rel": "root", "href": urls.catalog_href(), "type": MEDIA_JSON },
        ],
    })
}

/// Build the collection document over the full item set.
///
/// `item_ids` must already be in lexicographic order; with the
/// zero-padded date in the id that is also chronological order, and
/// the `item` link list preserves it.
pub fn collection_document(
    urls: &CatalogUrls,
    title: &str,
    description: &str,
    epsg: i32,
    step: f64,
    extent: &ExtentSummary,
    item_ids: &[String],
) -> Value {
    let [min_lon, min_lat, max_lon, max_lat] = extent.bbox;
    let start = extent.start.to_rfc3339();
    let end = extent.end.to_rfc3339();
    let gsd = step * DEGREES_TO_METERS;

    let reference_system = json!({
        "$schema": "https://proj.org/schemas/v0.2/projjson.schema.json",
        "type": "GeodeticCRS",
        "name": format!("EPSG:{epsg}"),
        "id": { "authority": "EPSG", "code": epsg },
    });

    let mut links = vec![
        json!({ "rel": "self", "href": urls.collection_href(), "type": MEDIA_JSON }),
        json!({ "rel": "root", "href": urls.catalog_href(), "type": MEDIA_JSON }),
        json!({ "rel": "parent", "href": urls.catalog_href(), "type": MEDIA_JSON }),
    ];
    for id in item_ids {
        links.push(json!({
            "rel": "item",
            "href": urls.item_href(id),
            "type": MEDIA_GEOJSON,
        }));
    }

    json!({
        "type": "Collection",
        "id": COLLECTION_ID,
        "stac_version": STAC_VERSION,
        "stac_extensions": [EXT_DATACUBE, EXT_EO],
        "title": title,
        "description": description,
        "license": "proprietary",
        "cube:dimensions": {
            "x": {
                "type": "spatial",
                "axis": "x",
                "extent": [min_lon, max_lon],
                "step": step,
                "reference_system": reference_system.clone(),
            },
            "y": {
                "type": "spatial",
                "axis": "y",
                "extent": [min_lat, max_lat],
                "step": step,
                "reference_system": reference_system,
            },
            "t": { "type": "temporal", "extent": [&start, &end] },
            "bands": { "type": "bands", "values": [BAND_NAME] },
        },
        "extent": {
            "spatial": { "bbox": [[min_lon, min_lat, max_lon, max_lat]] },
            "temporal": { "interval": [[&start, &end]] },
        },
        "summaries": {
            "eo:bands": [
                {
                    "name": BAND_NAME,
                    "center_wavelength": BAND_CENTER_WAVELENGTH,
                    "full_width_half_max": BAND_FWHM,
                    "common_name": null,
                    "gsd": gsd,
                    "offset": 0,
                    "scale": 1.0,
                    "type": "float32",
                    "unit": BAND_UNIT,
                }
            ],
            "bands": [
                {
                    "name": BAND_NAME,
                    "eo:center_wavelength": BAND_CENTER_WAVELENGTH,
                    "eo:common_name": null,
                }
            ],
            "gsd": [gsd],
        },
        "links": links,
    })
}

/// Build the root catalog document pointing at the one collection.
pub fn catalog_document(urls: &CatalogUrls, collection_title: &str) -> Value {
    json!({
        "type": "Catalog",
        "id": CATALOG_ID,
        "stac_version": STAC_VERSION,
        "title": CATALOG_TITLE,
        "description": CATALOG_DESCRIPTION,
        "links": [
            { "rel": "self", "href": urls.catalog_href(), "type": MEDIA_JSON },
            { "rel": "root", "href": urls.catalog_href(), "type": MEDIA_JSON },
            {
                "rel": "child",
                "href": urls.collection_href(),
                "type": MEDIA_JSON,
                "title": collection_title,
            },
        ],
    })
}

/// Read-side view of an item document; only the fields the updater
/// needs for the existing-id scan and the extent recomputation.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemDocument {
    pub id: String,
    pub bbox: [f64; 4],
    pub properties: ItemProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemProperties {
    pub datetime: DateTime<Utc>,
}

/// Write a document as pretty JSON, creating parent directories.
pub fn write_document(path: &Path, document: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(document)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::bbox_to_polygon;
    use chrono::TimeZone;

    fn urls() -> CatalogUrls {
        CatalogUrls::from_repo_url("https://github.com/dpabon/sif_dong_li_2023_sample")
    }

    fn meta() -> RasterMetadata {
        RasterMetadata {
            bbox: [10.0, 20.0, 11.0, 21.0],
            geometry: bbox_to_polygon(&[10.0, 20.0, 11.0, 21.0]),
            crs: Some("EPSG:4326".into()),
            shape: (100, 200),
            transform: [0.005, 0.0, 10.0, 0.0, -0.01, 21.0],
            dtype: "float32".into(),
            nodata: Some(-9999.0),
            count: 1,
        }
    }

    #[test]
    fn urls_swap_domain_and_append_subpaths() {
        let u = urls();
        assert_eq!(
            u.stac_base,
            "https://raw.githubusercontent.com/dpabon/sif_dong_li_2023_sample/main/stac"
        );
        assert_eq!(
            u.asset_base,
            "https://raw.githubusercontent.com/dpabon/sif_dong_li_2023_sample/main/data"
        );

        // A trailing slash on the repo URL must not double up.
        let u = CatalogUrls::from_repo_url("https://github.com/a/b/");
        assert_eq!(u.catalog_href(), "https://raw.githubusercontent.com/a/b/main/stac/catalog.json");
    }

    #[test]
    fn item_document_fields() {
        let dt = Utc.with_ymd_and_hms(2023, 7, 1, 0, 0, 0).unwrap();
        let item = item_document("SIF_20230701.tif", "SIF_20230701", &meta(), dt, &urls());

        assert_eq!(item["id"], "SIF_20230701");
        assert_eq!(item["stac_version"], STAC_VERSION);
        assert_eq!(item["properties"]["datetime"], "2023-07-01T00:00:00+00:00");
        assert_eq!(item["properties"]["proj:epsg"], 4326);
        assert_eq!(item["properties"]["proj:shape"], json!([100, 200]));
        assert_eq!(
            item["assets"]["data"]["href"],
            "https://raw.githubusercontent.com/dpabon/sif_dong_li_2023_sample/main/data/SIF_20230701.tif"
        );

        let rels: Vec<&str> = item["links"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["rel"].as_str().unwrap())
            .collect();
        assert_eq!(rels, ["self", "collection", "parent", "root"]);
    }

    #[test]
    fn item_document_omits_epsg_without_authority() {
        let mut m = meta();
        m.crs = None;
        let dt = Utc.with_ymd_and_hms(2023, 7, 1, 0, 0, 0).unwrap();
        let item = item_document("SIF_20230701.tif", "SIF_20230701", &m, dt, &urls());
        assert!(item["properties"].get("proj:epsg").is_none());
    }

    #[test]
    fn extent_aggregate_is_componentwise() {
        let bboxes = [[10.0, 20.0, 11.0, 21.0], [10.5, 19.0, 11.5, 20.0]];
        let dts = [
            Utc.with_ymd_and_hms(2023, 7, 2, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 7, 1, 0, 0, 0).unwrap(),
        ];
        let extent = ExtentSummary::aggregate(&bboxes, &dts).unwrap();
        assert_eq!(extent.bbox, [10.0, 19.0, 11.5, 21.0]);
        assert_eq!(extent.start, dts[1]);
        assert_eq!(extent.end, dts[0]);

        assert!(ExtentSummary::aggregate(&[], &[]).is_none());
    }

    #[test]
    fn collection_document_links_follow_item_order() {
        let extent = ExtentSummary {
            bbox: [10.0, 19.0, 11.5, 21.0],
            start: Utc.with_ymd_and_hms(2023, 7, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2023, 7, 2, 0, 0, 0).unwrap(),
        };
        let ids = vec!["SIF_20230701".to_string(), "SIF_20230702".to_string()];
        let coll = collection_document(&urls(), "SIF July 2023", "d", 4326, 0.005, &extent, &ids);

        assert_eq!(coll["id"], COLLECTION_ID);
        assert_eq!(coll["extent"]["spatial"]["bbox"], json!([[10.0, 19.0, 11.5, 21.0]]));
        assert_eq!(
            coll["extent"]["temporal"]["interval"],
            json!([["2023-07-01T00:00:00+00:00", "2023-07-02T00:00:00+00:00"]])
        );
        assert_eq!(coll["cube:dimensions"]["x"]["extent"], json!([10.0, 11.5]));
        assert_eq!(coll["cube:dimensions"]["y"]["extent"], json!([19.0, 21.0]));
        assert_eq!(coll["summaries"]["gsd"], json!([0.005 * DEGREES_TO_METERS]));

        let item_links: Vec<&str> = coll["links"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|l| l["rel"] == "item")
            .map(|l| l["href"].as_str().unwrap())
            .collect();
        assert_eq!(item_links.len(), 2);
        assert!(item_links[0].ends_with("/sif-collection/SIF_20230701/SIF_20230701.json"));
        assert!(item_links[1].ends_with("/sif-collection/SIF_20230702/SIF_20230702.json"));
    }

    #[test]
    fn catalog_document_points_at_collection() {
        let cat = catalog_document(&urls(), "SIF July 2023");
        assert_eq!(cat["id"], CATALOG_ID);
        let child = &cat["links"][2];
        assert_eq!(child["rel"], "child");
        assert_eq!(child["title"], "SIF July 2023");
        assert!(child["href"].as_str().unwrap().ends_with("/sif-collection/collection.json"));
    }
}
