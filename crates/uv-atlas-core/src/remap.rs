use crate::error::{AtlasError, Result};
use crate::host::Polygon;
use crate::transform::UvTransform;
use glam::DVec2;

/// First transform whose `origin` accepts `point` within `eps` per axis.
pub fn find_transform<'a, M>(
    transforms: &'a [UvTransform<M>],
    point: DVec2,
    eps: DVec2,
) -> Option<&'a UvTransform<M>> {
    transforms.iter().find(|t| t.is_match(point, eps.x, eps.y))
}

/// Remapping instructions for one material slot of an object.
#[derive(Debug, Clone)]
pub struct SlotRemap<'a, M> {
    pub slot: usize,
    /// Transforms of the slot's source material.
    pub transforms: &'a [UvTransform<M>],
    /// Matching tolerance in normalized UV units, per axis.
    pub eps: DVec2,
    /// Material the slot is reassigned to.
    pub target: M,
}

fn match_slot<'t, M>(
    polygons: &[Polygon],
    slot: usize,
    transforms: &'t [UvTransform<M>],
    eps: DVec2,
    out: &mut Vec<(usize, &'t UvTransform<M>)>,
) -> Result<()> {
    for (index, polygon) in polygons.iter().enumerate() {
        if polygon.slot != slot {
            continue;
        }
        let Some(mean) = polygon.mean_uv() else {
            continue;
        };
        // Matching by the mean keeps all loops of a polygon on one island.
        let transform =
            find_transform(transforms, mean, eps).ok_or(AtlasError::NoMatchingTransform {
                polygon: index,
                u: mean.x,
                v: mean.y,
            })?;
        out.push((index, transform));
    }
    Ok(())
}

fn apply_matches<M>(polygons: &mut [Polygon], matched: &[(usize, &UvTransform<M>)]) {
    for &(index, transform) in matched {
        for uv in polygons[index].uvs.iter_mut() {
            *uv = transform.apply(*uv);
        }
    }
}

/// Remaps the polygons of every planned slot and reassigns those slots to their target.
///
/// All slots are matched before anything is written, so on error `polygons` and
/// `slots` are unchanged.
pub fn remap_polygons<M: Clone>(
    polygons: &mut [Polygon],
    slots: &mut [Option<M>],
    plan: &[SlotRemap<'_, M>],
) -> Result<usize> {
    let mut matched = Vec::new();
    for entry in plan {
        if entry.slot >= slots.len() {
            return Err(AtlasError::InvalidConfig(format!(
                "slot {} out of range ({} slots)",
                entry.slot,
                slots.len()
            )));
        }
        match_slot(polygons, entry.slot, entry.transforms, entry.eps, &mut matched)?;
    }
    apply_matches(polygons, &matched);
    for entry in plan {
        slots[entry.slot] = Some(entry.target.clone());
    }
    Ok(matched.len())
}
