//! Render queue ordering
//!
//! A camera's queue is reordered before drawing:
//!
//! - consecutive runs that differ in depth testing are never reordered
//!   relative to each other, nor is anything inside a non-depth-tested run;
//! - inside a depth-tested run, opaque draws come first, grouped by material,
//!   then property block, then mesh, each group placed where its first member
//!   appeared;
//! - transparent draws follow, farthest from the camera first.
//!
//! Both sorts are stable.

use glam::Vec3;

/// What the ordering needs to know about a queued draw.
pub(crate) trait QueueItem {
    fn is_depth_tested(&self) -> bool;
    fn is_transparent(&self) -> bool;
    fn world_midpoint(&self) -> Vec3;
    fn same_material(&self, other: &Self) -> bool;
    fn same_property_block(&self, other: &Self) -> bool;
    fn same_mesh(&self, other: &Self) -> bool;
}

pub(crate) fn sort_render_queue<T: QueueItem>(queue: Vec<T>, camera_position: Vec3) -> Vec<T> {
    let mut sorted = Vec::with_capacity(queue.len());
    let mut rest = queue.into_iter().peekable();

    while let Some(first) = rest.next() {
        let depth_tested = first.is_depth_tested();
        let mut run = vec![first];
        while let Some(next) = rest.next_if(|o| o.is_depth_tested() == depth_tested) {
            run.push(next);
        }

        if depth_tested {
            sort_depth_tested_run(run, camera_position, &mut sorted);
        } else {
            sorted.extend(run);
        }
    }

    sorted
}

fn sort_depth_tested_run<T: QueueItem>(run: Vec<T>, camera_position: Vec3, out: &mut Vec<T>) {
    let (opaque, mut transparent): (Vec<T>, Vec<T>) = run.into_iter().partition(|o| !o.is_transparent());

    let keys = batch_keys(&opaque);
    let mut keyed: Vec<_> = keys.into_iter().zip(opaque).collect();
    keyed.sort_by_key(|(key, _)| *key);
    out.extend(keyed.into_iter().map(|(_, o)| o));

    transparent.sort_by(|a, b| {
        let da = camera_position.distance_squared(a.world_midpoint());
        let db = camera_position.distance_squared(b.world_midpoint());
        db.total_cmp(&da)
    });
    out.extend(transparent);
}

/// `(material, block, mesh)` group indices, numbered in order of first
/// appearance. Blocks are numbered within a material and meshes within a
/// block.
fn batch_keys<T: QueueItem>(items: &[T]) -> Vec<(usize, usize, usize)> {
    // representative item index for each distinct group
    let mut materials: Vec<usize> = Vec::new();
    let mut blocks: Vec<(usize, usize)> = Vec::new();
    let mut meshes: Vec<(usize, usize, usize)> = Vec::new();

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let material = materials
                .iter()
                .position(|&r| items[r].same_material(item))
                .unwrap_or_else(|| {
                    materials.push(i);
                    materials.len() - 1
                });

            let block = blocks
                .iter()
                .position(|&(m, r)| m == material && items[r].same_property_block(item))
                .unwrap_or_else(|| {
                    blocks.push((material, i));
                    blocks.len() - 1
                });

            let mesh = meshes
                .iter()
                .position(|&(m, b, r)| m == material && b == block && items[r].same_mesh(item))
                .unwrap_or_else(|| {
                    meshes.push((material, block, i));
                    meshes.len() - 1
                });

            (material, block, mesh)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    struct Item {
        id: u32,
        depth_tested: bool,
        transparent: bool,
        material: u32,
        block: u32,
        mesh: u32,
        z: f32,
    }

    impl Item {
        fn opaque(id: u32, material: u32, block: u32, mesh: u32) -> Self {
            Self {
                id,
                depth_tested: true,
                transparent: false,
                material,
                block,
                mesh,
                z: 0.0,
            }
        }

        fn transparent(id: u32, z: f32) -> Self {
            Self {
                transparent: true,
                z,
                ..Self::opaque(id, 100, 0, 0)
            }
        }

        fn overlay(id: u32) -> Self {
            Self {
                depth_tested: false,
                ..Self::opaque(id, 0, 0, 0)
            }
        }
    }

    impl QueueItem for Item {
        fn is_depth_tested(&self) -> bool {
            self.depth_tested
        }
        fn is_transparent(&self) -> bool {
            self.transparent
        }
        fn world_midpoint(&self) -> Vec3 {
            Vec3::new(0.0, 0.0, self.z)
        }
        fn same_material(&self, other: &Self) -> bool {
            self.material == other.material
        }
        fn same_property_block(&self, other: &Self) -> bool {
            self.block == other.block
        }
        fn same_mesh(&self, other: &Self) -> bool {
            self.mesh == other.mesh
        }
    }

    fn ids(items: &[Item]) -> Vec<u32> {
        items.iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_opaque_grouped_by_first_appearance() {
        let queue = vec![
            Item::opaque(0, 1, 0, 0),
            Item::opaque(1, 2, 0, 0),
            Item::opaque(2, 1, 0, 0),
            Item::opaque(3, 2, 0, 0),
        ];
        let sorted = sort_render_queue(queue, Vec3::ZERO);
        assert_eq!(ids(&sorted), vec![0, 2, 1, 3]);
    }

    #[test]
    fn test_blocks_and_meshes_grouped_within_material() {
        let queue = vec![
            Item::opaque(0, 1, 7, 3),
            Item::opaque(1, 1, 8, 3),
            Item::opaque(2, 1, 7, 4),
            Item::opaque(3, 1, 7, 3),
            Item::opaque(4, 1, 8, 3),
        ];
        let sorted = sort_render_queue(queue, Vec3::ZERO);
        assert_eq!(ids(&sorted), vec![0, 3, 2, 1, 4]);
    }

    #[test]
    fn test_transparent_after_opaque_back_to_front() {
        let queue = vec![
            Item::transparent(0, -1.0),
            Item::opaque(1, 1, 0, 0),
            Item::transparent(2, -10.0),
            Item::transparent(3, -5.0),
        ];
        let sorted = sort_render_queue(queue, Vec3::ZERO);
        assert_eq!(ids(&sorted), vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_equal_distances_keep_submission_order() {
        let queue = vec![
            Item::transparent(0, -2.0),
            Item::transparent(1, 2.0),
            Item::transparent(2, -2.0),
        ];
        let sorted = sort_render_queue(queue, Vec3::ZERO);
        assert_eq!(ids(&sorted), vec![0, 1, 2]);
    }

    #[test]
    fn test_non_depth_tested_runs_are_barriers() {
        let queue = vec![
            Item::opaque(0, 1, 0, 0),
            Item::overlay(1),
            Item::opaque(2, 1, 0, 0),
            Item::opaque(3, 2, 0, 0),
            Item::opaque(4, 1, 0, 0),
        ];
        let sorted = sort_render_queue(queue, Vec3::ZERO);
        // item 0 cannot join 2 and 4 across the overlay
        assert_eq!(ids(&sorted), vec![0, 1, 2, 4, 3]);
    }

    #[test]
    fn test_non_depth_tested_run_is_untouched() {
        let mut a = Item::overlay(0);
        a.material = 2;
        let mut b = Item::overlay(1);
        b.transparent = true;
        let c = Item::overlay(2);
        let sorted = sort_render_queue(vec![a, b, c], Vec3::ZERO);
        assert_eq!(ids(&sorted), vec![0, 1, 2]);
    }
}
