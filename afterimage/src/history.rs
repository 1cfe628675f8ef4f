use fxhash::FxHashMap;
use log::{debug, info};

use crate::{Backend, ImageDesc, ResourceDesc, Result};

/// Identifies a camera (a view) whose history is being tracked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraHandle(pub u64);

/// Identifies which effect a history slot belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectTag {
    Taa,
    AmbientOcclusion,
    Irradiance,
}

impl EffectTag {
    pub fn name(self) -> &'static str {
        match self {
            EffectTag::Taa => "taa",
            EffectTag::AmbientOcclusion => "ssao",
            EffectTag::Irradiance => "ssgi",
        }
    }
}

/// Persistent resource holding an effect's accumulated history.
#[derive(Clone, Debug)]
pub struct HistorySlot<R> {
    pub camera: CameraHandle,
    pub effect: EffectTag,
    pub resource: R,
    pub desc: ImageDesc,

    /// Frame since which the slot holds meaningful data
    pub valid_since: u64,

    /// Frame during which the slot was last requested
    pub last_requested: u64,
}

impl<R> HistorySlot<R> {
    pub fn is_fresh_at(&self, frame: u64) -> bool {
        self.valid_since == frame
    }
}

/// Per-camera store of histories, one slot per effect.
///
/// Slots are created on first request and reset (i.e. reported as fresh, so
/// that the caller seeds them instead of reading garbage) when:
///
/// - their size or format changes,
/// - they weren't requested during the previous frame (the effect was toggled
///   off for a while).
///
/// Slots not requested during a frame are evicted in [`Self::end_frame()`].
#[derive(Debug)]
pub struct HistoryCache<R> {
    frame: u64,
    slots: FxHashMap<(CameraHandle, EffectTag), HistorySlot<R>>,
}

impl<R> HistoryCache<R>
where
    R: Clone,
{
    pub fn new() -> Self {
        Self {
            frame: 0,
            slots: Default::default(),
        }
    }

    pub fn begin_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Returns history of given effect for given camera, together with a flag
    /// telling whether the history is fresh (i.e. holds no meaningful data).
    pub fn get_or_create<B>(
        &mut self,
        backend: &mut B,
        camera: CameraHandle,
        effect: EffectTag,
        desc: ImageDesc,
    ) -> Result<(HistorySlot<R>, bool)>
    where
        B: Backend<Resource = R>,
    {
        let frame = self.frame;
        let key = (camera, effect);

        if let Some(slot) = self.slots.get_mut(&key) {
            if slot.desc.size == desc.size && slot.desc.format == desc.format {
                let requested_recently = slot.last_requested == frame
                    || slot.last_requested.checked_add(1) == Some(frame);

                if !requested_recently {
                    debug!(
                        "Resetting history: camera={:?}, effect={:?} (not \
                         requested since frame {})",
                        camera, effect, slot.last_requested,
                    );

                    slot.valid_since = frame;
                }

                slot.last_requested = frame;

                return Ok((slot.clone(), slot.is_fresh_at(frame)));
            }

            info!(
                "Reallocating history: camera={:?}, effect={:?}, size={} -> {}",
                camera, effect, slot.desc.size, desc.size,
            );

            if let Some(slot) = self.slots.remove(&key) {
                backend.release(slot.resource);
            }
        } else {
            info!(
                "Allocating history: camera={:?}, effect={:?}, size={}",
                camera, effect, desc.size,
            );
        }

        let label = format!("history_{}_{}", effect.name(), camera.0);
        let resource = backend.allocate(&label, &ResourceDesc::Image(desc))?;

        let slot = HistorySlot {
            camera,
            effect,
            resource,
            desc,
            valid_since: frame,
            last_requested: frame,
        };

        self.slots.insert(key, slot.clone());

        Ok((slot, true))
    }

    pub fn get(
        &self,
        camera: CameraHandle,
        effect: EffectTag,
    ) -> Option<&HistorySlot<R>> {
        self.slots.get(&(camera, effect))
    }

    /// Releases history of given effect; returns whether there was anything to
    /// release.
    pub fn release<B>(
        &mut self,
        backend: &mut B,
        camera: CameraHandle,
        effect: EffectTag,
    ) -> bool
    where
        B: Backend<Resource = R>,
    {
        if let Some(slot) = self.slots.remove(&(camera, effect)) {
            info!("Releasing history: camera={camera:?}, effect={effect:?}");

            backend.release(slot.resource);
            true
        } else {
            false
        }
    }

    /// Releases all histories of given camera; returns how many got released.
    pub fn release_camera<B>(
        &mut self,
        backend: &mut B,
        camera: CameraHandle,
    ) -> usize
    where
        B: Backend<Resource = R>,
    {
        let keys: Vec<_> = self
            .slots
            .keys()
            .filter(|(slot_camera, _)| *slot_camera == camera)
            .copied()
            .collect();

        for key in &keys {
            if let Some(slot) = self.slots.remove(key) {
                backend.release(slot.resource);
            }
        }

        if !keys.is_empty() {
            info!(
                "Released histories of camera {:?}: {}",
                camera,
                keys.len()
            );
        }

        keys.len()
    }

    /// Evicts slots that haven't been requested during the current frame.
    pub fn end_frame<B>(&mut self, backend: &mut B)
    where
        B: Backend<Resource = R>,
    {
        let frame = self.frame;

        let stale: Vec<_> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.last_requested != frame)
            .map(|(key, _)| *key)
            .collect();

        for key in stale {
            if let Some(slot) = self.slots.remove(&key) {
                info!(
                    "Evicting history: camera={:?}, effect={:?}",
                    slot.camera, slot.effect
                );

                backend.release(slot.resource);
            }
        }
    }

    pub fn contains(&self, camera: CameraHandle, effect: EffectTag) -> bool {
        self.slots.contains_key(&(camera, effect))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<R> Default for HistoryCache<R>
where
    R: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use glam::uvec2;

    use super::*;
    use crate::backends::cpu::CpuBackend;

    const CAMERA: CameraHandle = CameraHandle(1);

    fn desc(size: u32) -> ImageDesc {
        ImageDesc::new(uvec2(size, size), wgpu::TextureFormat::Rgba16Float)
    }

    fn request(
        target: &mut HistoryCache<<CpuBackend as Backend>::Resource>,
        backend: &mut CpuBackend,
        frame: u64,
        size: u32,
    ) -> bool {
        target.begin_frame(frame);

        let (_, fresh) = target
            .get_or_create(backend, CAMERA, EffectTag::Taa, desc(size))
            .unwrap();

        target.end_frame(backend);
        fresh
    }

    #[test]
    fn freshness() {
        let mut backend = CpuBackend::new();
        let mut target = HistoryCache::new();

        assert!(request(&mut target, &mut backend, 0, 4));
        assert!(!request(&mut target, &mut backend, 1, 4));
        assert!(!request(&mut target, &mut backend, 2, 4));

        // Resized
        assert!(request(&mut target, &mut backend, 3, 8));
        assert!(!request(&mut target, &mut backend, 4, 8));

        assert_eq!(2, backend.stats().allocations);
        assert_eq!(1, backend.stats().releases);
    }

    #[test]
    fn reformatting_resets_history() {
        let mut backend = CpuBackend::new();
        let mut target = HistoryCache::new();
        let rgba16 = desc(4);

        let rgba32 = ImageDesc {
            format: wgpu::TextureFormat::Rgba32Float,
            ..rgba16
        };

        for (frame, desc, fresh) in [
            (0, rgba16, true),
            (1, rgba16, false),
            (2, rgba32, true),
            (3, rgba32, false),
        ] {
            target.begin_frame(frame);

            let (slot, is_fresh) = target
                .get_or_create(&mut backend, CAMERA, EffectTag::Taa, desc)
                .unwrap();

            target.end_frame(&mut backend);

            assert_eq!(fresh, is_fresh, "frame {frame}");
            assert_eq!(desc.format, slot.desc.format);
        }

        assert_eq!(2, backend.stats().allocations);
        assert_eq!(1, backend.stats().releases);
    }

    #[test]
    fn repeated_requests_within_frame() {
        let mut backend = CpuBackend::new();
        let mut target = HistoryCache::new();

        target.begin_frame(10);

        let (a, fresh_a) = target
            .get_or_create(&mut backend, CAMERA, EffectTag::Taa, desc(4))
            .unwrap();

        let (b, fresh_b) = target
            .get_or_create(&mut backend, CAMERA, EffectTag::Taa, desc(4))
            .unwrap();

        assert!(fresh_a);
        assert!(fresh_b);
        assert!(a.resource.ptr_eq(&b.resource));
        assert_eq!(10, b.valid_since);
    }

    #[test]
    fn skipped_frame_resets_history() {
        let mut backend = CpuBackend::new();
        let mut target = HistoryCache::new();

        assert!(request(&mut target, &mut backend, 0, 4));

        // Not requested during frame 1, so evicted by its `end_frame()`
        target.begin_frame(1);
        target.end_frame(&mut backend);

        assert!(!target.contains(CAMERA, EffectTag::Taa));
        assert!(request(&mut target, &mut backend, 2, 4));
    }

    #[test]
    fn skipped_frame_without_eviction_resets_history() {
        let mut backend = CpuBackend::new();
        let mut target = HistoryCache::new();

        target.begin_frame(0);

        target
            .get_or_create(&mut backend, CAMERA, EffectTag::Taa, desc(4))
            .unwrap();

        target.begin_frame(2);

        let (slot, fresh) = target
            .get_or_create(&mut backend, CAMERA, EffectTag::Taa, desc(4))
            .unwrap();

        assert!(fresh);
        assert_eq!(2, slot.valid_since);
        assert_eq!(1, backend.stats().allocations);
    }

    #[test]
    fn release() {
        let mut backend = CpuBackend::new();
        let mut target = HistoryCache::new();

        target.begin_frame(0);

        for effect in [EffectTag::Taa, EffectTag::AmbientOcclusion] {
            for camera in [CameraHandle(1), CameraHandle(2)] {
                target
                    .get_or_create(&mut backend, camera, effect, desc(4))
                    .unwrap();
            }
        }

        assert_eq!(4, target.len());

        assert!(target.release(
            &mut backend,
            CameraHandle(1),
            EffectTag::AmbientOcclusion
        ));

        assert!(!target.release(
            &mut backend,
            CameraHandle(1),
            EffectTag::AmbientOcclusion
        ));

        assert_eq!(1, target.release_camera(&mut backend, CameraHandle(1)));
        assert_eq!(0, target.release_camera(&mut backend, CameraHandle(1)));
        assert_eq!(2, target.len());
        assert!(target.contains(CameraHandle(2), EffectTag::Taa));
        assert_eq!(2, backend.stats().releases);

        target.begin_frame(1);
        target.end_frame(&mut backend);

        assert!(target.is_empty());
        assert_eq!(0, backend.stats().live());
    }
}
