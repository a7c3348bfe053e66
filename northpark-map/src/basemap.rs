//! Raster tile layer construction for basemaps and the imagery reference
//! overlay.

use galileo::layer::raster_tile_layer::{RasterTileLayer, RasterTileLayerBuilder};
use galileo::tile_schema::TileIndex;
use galileo::TileSchema;

use crate::config::Basemap;
use crate::error::PlanMapError;

/// Expands a `{z}/{x}/{y}` URL template for one tile.
fn tile_url(template: &str, index: TileIndex) -> String {
    template
        .replace("{z}", &index.z.to_string())
        .replace("{x}", &index.x.to_string())
        .replace("{y}", &index.y.to_string())
}

/// Builds the tile layer for a basemap or the reference overlay.
///
/// Tiles are cached on disk; the cache directory is shared by all tile
/// layers and keyed by URL.
pub fn build_tile_layer(basemap: &Basemap) -> Result<RasterTileLayer, PlanMapError> {
    let template = basemap.url_template.clone();
    let layer = RasterTileLayerBuilder::new_rest(move |index: &TileIndex| {
        tile_url(&template, *index)
    })
    .with_tile_schema(TileSchema::web(basemap.max_zoom))
    .with_attribution(
        basemap.attribution.text.clone(),
        basemap.attribution.url.clone().unwrap_or_default(),
    )
    .with_file_cache_checked(".tile_cache")
    .build()?;

    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_placeholders_are_substituted() {
        let url = tile_url(
            "https://basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png",
            TileIndex::new(3, 5, 7),
        );
        assert_eq!(url, "https://basemaps.cartocdn.com/light_all/7/3/5.png");
    }

    #[test]
    fn arcgis_style_templates_swap_x_and_y() {
        let url = tile_url(
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
            TileIndex::new(3, 5, 7),
        );
        assert!(url.ends_with("/tile/7/5/3"));
    }
}
