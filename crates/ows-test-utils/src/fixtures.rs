//! Sample configuration trees and datacube products.
//!
//! Products are plain JSON in the shape `ows_config::ProductInfo`
//! deserializes from, so this crate does not depend on the engine.

use serde_json::{Value, json};

/// Flag definitions of the `fmask` band.
pub fn fmask_flags() -> Value {
    json!({
        "nodata": {"bits": 0, "values": {"0": false, "1": true}},
        "cloud": {"bits": 1, "values": {"0": false, "1": true}},
        "water": {"bits": 2, "values": {"0": false, "1": true}}
    })
}

/// The `ls8_ard` product.
pub fn ls8_product() -> Value {
    json!({
        "name": "ls8_ard",
        "measurements": {
            "nbart_red": {"aliases": ["red"]},
            "nbart_green": {"aliases": ["green"]},
            "nbart_blue": {"aliases": ["blue"]},
            "nbart_nir": {"aliases": ["nir"]},
            "fmask": {"aliases": [], "flags_definition": fmask_flags()}
        }
    })
}

/// A global section exercising every metadata field.
pub fn global_section() -> Value {
    json!({
        "title": "Test OWS",
        "abstract": "A test web service",
        "keywords": ["satellite", "landsat"],
        "contact_info": {"organisation": "Geoscience", "position": "Data officer"},
        "fees": "",
        "access_constraints": "",
        "attribution": {"title": "Open Data Cube", "url": "https://opendatacube.org"}
    })
}

/// The `ls8` layer: three styles (one inheriting), a flag band and a legend.
pub fn ls8_layer() -> Value {
    json!({
        "name": "ls8",
        "title": "Landsat 8",
        "abstract": "Landsat 8 analysis ready data",
        "keywords": ["ard"],
        "product_name": "ls8_ard",
        "bands": {
            "nbart_red": ["red"],
            "nbart_green": ["green"],
            "nbart_blue": ["blue"],
            "nbart_nir": ["nir"],
            "fmask": ["pq"]
        },
        "flags": [{"band": "fmask", "ignore_info_flags": ["nodata"]}],
        "styling": {
            "default_style": "simple_rgb",
            "styles": [
                {
                    "name": "simple_rgb",
                    "title": "Simple RGB",
                    "abstract": "True colour",
                    "needed_bands": ["red", "green", "blue"]
                },
                {
                    "inherits": {"style": "simple_rgb"},
                    "name": "bright_rgb",
                    "title": "Bright RGB"
                },
                {
                    "name": "cloud_mask",
                    "title": "Cloud mask",
                    "abstract": "Cloud classification from fmask",
                    "value_map": {
                        "pq": [
                            {"title": "Cloud", "flags": {"cloud": true}, "color": "#FFFFFF"},
                            {"title": "Clear", "flags": {"cloud": false}, "color": "#000000"}
                        ]
                    },
                    "legend": {
                        "units": "class",
                        "ticks": [0, 1],
                        "tick_labels": {"0": {"label": "Clear"}, "1": {"label": "Cloudy"}}
                    }
                }
            ]
        }
    })
}

/// A complete configuration: `ls8` inside a folder, and `ls8_bright`
/// inheriting from it.
pub fn sample_config() -> Value {
    json!({
        "global": global_section(),
        "layers": [
            {
                "title": "Landsat",
                "abstract": "Landsat layers",
                "layers": [ls8_layer()]
            },
            {
                "inherits": {"layer": "ls8"},
                "name": "ls8_bright",
                "title": "Landsat 8 (bright)"
            }
        ]
    })
}
