//! Static dataset registry. Pure data, owned for the life of the process;
//! nothing here is mutated after startup.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Image,
    Collection,
}

/// Default rendering parameters for the `/image` endpoint.
#[derive(Debug, Clone, Copy)]
pub struct VisParams {
    pub bands: &'static [&'static str],
    pub min: f64,
    pub max: f64,
    pub palette: Option<&'static [&'static str]>,
}

#[derive(Debug, Clone, Copy)]
pub struct Dataset {
    pub name: &'static str,
    pub remote_id: &'static str,
    pub bands: &'static [&'static str],
    pub kind: DatasetKind,
    /// Native resolution in meters, used unless the request overrides it.
    pub default_scale: f64,
    pub vis: VisParams,
}

pub const DATASETS: [Dataset; 7] = [
    Dataset {
        name: "Sentinel-2 Surface Reflectance",
        remote_id: "COPERNICUS/S2_SR_HARMONIZED",
        bands: &["B4", "B3", "B2", "B8"],
        kind: DatasetKind::Collection,
        default_scale: 10.0,
        vis: VisParams {
            bands: &["B4", "B3", "B2"],
            min: 0.0,
            max: 3000.0,
            palette: None,
        },
    },
    Dataset {
        name: "Sentinel-1 SAR GRD",
        remote_id: "COPERNICUS/S1_GRD",
        bands: &["VV", "VH"],
        kind: DatasetKind::Collection,
        default_scale: 10.0,
        vis: VisParams {
            bands: &["VV"],
            min: -25.0,
            max: 0.0,
            palette: None,
        },
    },
    Dataset {
        name: "Landsat 9 Surface Reflectance",
        remote_id: "LANDSAT/LC09/C02/T1_L2",
        bands: &["SR_B4", "SR_B3", "SR_B2", "SR_B5"],
        kind: DatasetKind::Collection,
        default_scale: 30.0,
        vis: VisParams {
            bands: &["SR_B4", "SR_B3", "SR_B2"],
            min: 7000.0,
            max: 30000.0,
            palette: None,
        },
    },
    Dataset {
        name: "SRTM Digital Elevation",
        remote_id: "USGS/SRTMGL1_003",
        bands: &["elevation"],
        kind: DatasetKind::Image,
        default_scale: 30.0,
        vis: VisParams {
            bands: &["elevation"],
            min: 0.0,
            max: 4000.0,
            palette: Some(&["006633", "E5FFCC", "662A00", "D8D8D8", "F5F5F5"]),
        },
    },
    Dataset {
        name: "MODIS Vegetation Indices",
        remote_id: "MODIS/061/MOD13Q1",
        bands: &["NDVI", "EVI"],
        kind: DatasetKind::Collection,
        default_scale: 250.0,
        vis: VisParams {
            bands: &["NDVI"],
            min: 0.0,
            max: 9000.0,
            palette: Some(&["FFFFFF", "CE7E45", "FCD163", "66A000", "207401", "004C00"]),
        },
    },
    Dataset {
        name: "MODIS Land Surface Temperature",
        remote_id: "MODIS/061/MOD11A1",
        bands: &["LST_Day_1km"],
        kind: DatasetKind::Collection,
        default_scale: 927.67,
        vis: VisParams {
            bands: &["LST_Day_1km"],
            min: 13000.0,
            max: 16500.0,
            palette: Some(&["040274", "307EF3", "30C8E2", "86E26F", "FFD611", "FF0000"]),
        },
    },
    Dataset {
        name: "ESA WorldCover",
        remote_id: "ESA/WorldCover/v200",
        bands: &["Map"],
        kind: DatasetKind::Image,
        default_scale: 10.0,
        vis: VisParams {
            bands: &["Map"],
            min: 10.0,
            max: 100.0,
            palette: None,
        },
    },
];

pub fn find(name: &str) -> Option<&'static Dataset> {
    DATASETS.iter().find(|d| d.name == name)
}
