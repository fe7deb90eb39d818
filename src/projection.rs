use proj::Proj;
use tracing::info;

use crate::config::ProjectionConfig;
use crate::error::Result;
use crate::model::{LineLayer, PointLayer};

/// Moves layers from the delivery CRS into the metric CRS the thresholds
/// are expressed in.
pub struct Reprojector {
    proj: Option<Proj>,
    target_epsg: i32,
}

impl Reprojector {
    pub fn new(config: &ProjectionConfig) -> Result<Self> {
        let proj = if config.source_epsg == config.target_epsg {
            None
        } else {
            Some(Proj::new_known_crs(
                format!("EPSG:{}", config.source_epsg).as_str(),
                format!("EPSG:{}", config.target_epsg).as_str(),
                None,
            )?)
        };
        Ok(Reprojector {
            proj,
            target_epsg: config.target_epsg,
        })
    }

    pub fn target_epsg(&self) -> i32 {
        self.target_epsg
    }

    pub fn lines(&self, layer: &mut LineLayer) -> Result<()> {
        let Some(proj) = &self.proj else {
            return Ok(());
        };
        for feature in &mut layer.features {
            proj.convert_array(&mut feature.geometry.0)?;
        }
        info!("Transformed {} arcs of {}", layer.len(), layer.name);
        Ok(())
    }

    pub fn points(&self, layer: &mut PointLayer) -> Result<()> {
        let Some(proj) = &self.proj else {
            return Ok(());
        };
        for feature in &mut layer.features {
            feature.geometry = proj.convert(feature.geometry)?;
        }
        info!("Transformed {} points of {}", layer.len(), layer.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Feature;
    use geo::line_string;

    #[test]
    fn identical_crs_leaves_coordinates_alone() {
        let config = ProjectionConfig {
            source_epsg: 3348,
            target_epsg: 3348,
        };
        let reprojector = Reprojector::new(&config).unwrap();
        let mut layer = LineLayer::new(
            "roadseg",
            vec![Feature::new("a", line_string![(x: 1.5, y: 2.5), (x: 3.0, y: 4.0)])],
        );
        reprojector.lines(&mut layer).unwrap();
        assert_eq!(layer.features[0].geometry, line_string![(x: 1.5, y: 2.5), (x: 3.0, y: 4.0)]);
        assert_eq!(reprojector.target_epsg(), 3348);
    }
}
