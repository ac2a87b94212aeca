//! Raster header extraction via GDAL.
//!
//! Opens one GeoTIFF, reads its header, and reprojects the native
//! bounds into WGS84 so that extent aggregation downstream can compare
//! bounding boxes in a single frame. The dataset handle is scoped to
//! `extract` and released on every exit path.

use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::Dataset;
use serde_json::Value;
use std::path::Path;

use crate::error::{CatalogError, Result};

/// Geospatial header of one raster file, bounds reprojected to WGS84.
#[derive(Debug, Clone)]
pub struct RasterMetadata {
    /// `[west, south, east, north]` in EPSG:4326.
    pub bbox: [f64; 4],
    /// GeoJSON polygon of `bbox`.
    pub geometry: Value,
    /// Native CRS identifier, e.g. `"EPSG:4326"`, when the header
    /// carries an authority code.
    pub crs: Option<String>,
    /// `(rows, cols)`.
    pub shape: (usize, usize),
    /// Affine coefficients `(a, b, c, d, e, f)`: pixel width, row
    /// rotation, origin x, column rotation, pixel height, origin y.
    pub transform: [f64; 6],
    /// Band 1 pixel type name, lowercase (e.g. `"float32"`).
    pub dtype: String,
    pub nodata: Option<f64>,
    pub count: usize,
}

impl RasterMetadata {
    /// Numeric EPSG-style code of the native CRS, if it encodes one.
    pub fn epsg_code(&self) -> Option<i32> {
        self.crs
            .as_deref()
            .and_then(|crs| crs.rsplit_once(':'))
            .and_then(|(_, code)| code.parse().ok())
    }
}

/// Read the geospatial header of `path`.
///
/// Fails when the file is missing, not a raster, or lacks a
/// geotransform or coordinate reference system.
pub fn extract(path: &Path) -> Result<RasterMetadata> {
    let dataset = Dataset::open(path).map_err(|e| unreadable(path, e))?;

    let gt = dataset.geo_transform().map_err(|e| unreadable(path, e))?;
    let (cols, rows) = dataset.raster_size();

    // Native-frame corners from the geotransform. gt[5] is typically
    // negative (north-up), so order the pair explicitly.
    let x0 = gt[0];
    let x1 = gt[0] + cols as f64 * gt[1] + rows as f64 * gt[2];
    let y0 = gt[3];
    let y1 = gt[3] + cols as f64 * gt[4] + rows as f64 * gt[5];
    let (min_x, max_x) = (x0.min(x1), x0.max(x1));
    let (min_y, max_y) = (y0.min(y1), y0.max(y1));

    let mut native_srs = dataset.spatial_ref().map_err(|e| unreadable(path, e))?;
    native_srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    let crs = crs_identifier(&native_srs);

    let mut wgs84 = SpatialRef::from_epsg(4326)?;
    wgs84.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

    // Reproject all four corners; taking min/max afterwards keeps the
    // box valid when the projection warps edges.
    let transform = CoordTransform::new(&native_srs, &wgs84)?;
    let mut xs = [min_x, max_x, max_x, min_x];
    let mut ys = [min_y, min_y, max_y, max_y];
    transform
        .transform_coords(&mut xs, &mut ys, &mut [])
        .map_err(|e| unreadable(path, e))?;

    let bbox = [
        xs.iter().copied().fold(f64::INFINITY, f64::min),
        ys.iter().copied().fold(f64::INFINITY, f64::min),
        xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    ];

    let band = dataset.rasterband(1).map_err(|e| unreadable(path, e))?;

    Ok(RasterMetadata {
        bbox,
        geometry: bbox_to_polygon(&bbox),
        crs,
        shape: (rows, cols),
        // GDAL order -> affine (a, b, c, d, e, f) order.
        transform: [gt[1], gt[2], gt[0], gt[4], gt[5], gt[3]],
        dtype: band.band_type().to_string().to_lowercase(),
        nodata: band.no_data_value(),
        count: dataset.raster_count(),
    })
}

/// Convert a `[west, south, east, north]` bbox to a GeoJSON Polygon.
pub fn bbox_to_polygon(bbox: &[f64; 4]) -> Value {
    let [west, south, east, north] = *bbox;
    serde_json::json!({
        "type": "Polygon",
        "coordinates": [[
            [west, south],
            [east, south],
            [east, north],
            [west, north],
            [west, south]
        ]]
    })
}

fn crs_identifier(srs: &SpatialRef) -> Option<String> {
    let name = srs.auth_name()?;
    let code = srs.auth_code().ok()?;
    Some(format!("{name}:{code}"))
}

fn unreadable(path: &Path, e: impl std::fmt::Display) -> CatalogError {
    CatalogError::UnreadableRaster {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
