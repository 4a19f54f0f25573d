use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use rand::Rng;

use crate::gpu::commands::{RenderTargetId, TextureId, UvRect};
use crate::queue::ViewOperation;

/// Unique identifier of a HUD view. Ids are random, nonzero, and never
/// reused for the lifetime of the process: a destroyed view's id stays
/// retired so stale handles held by the host keep failing cleanly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback invoked on the engine thread when a view's document reaches
/// DOM-ready.
pub type DomReadyCallback = Arc<dyn Fn(ViewId) + Send + Sync>;

/// Device resources a realized view draws into, recorded on the render
/// thread so teardown can release them after the engine view is gone.
#[derive(Debug, Default, Clone)]
pub struct ViewGpuRefs {
    pub render_target_texture: Option<TextureId>,
    pub render_target: Option<RenderTargetId>,
    pub uv: Option<UvRect>,
}

/// CPU-side pixel copy of a view surface. Kept per view for hosts that
/// composite from system memory instead of sharing the engine's texture;
/// cleared on teardown so the memory is returned promptly.
#[derive(Debug, Default)]
pub struct StagingBuffer {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

impl StagingBuffer {
    pub fn clear(&mut self) {
        self.pixels = Vec::new();
        self.width = 0;
        self.height = 0;
        self.stride = 0;
    }
}

/// Shared, thread-safe record of one view. The engine-side object lives on
/// the engine thread; everything here is metadata any thread may touch.
pub struct ViewEntry {
    pub id: ViewId,
    /// URL waiting to be loaded once the view is realized on the engine
    /// thread. Taken (and not restored) by the realization pass.
    pub pending_load: Mutex<Option<String>>,
    pub realized: AtomicBool,
    pub hidden: AtomicBool,
    pub loading_finished: AtomicBool,
    /// True while this view holds focus with host pausing requested.
    pub paused: AtomicBool,
    pub new_frame_ready: AtomicBool,
    /// Set by teardown while the view's device resources await release on
    /// the render thread; cleared once the release has been queued.
    pub pending_resource_release: AtomicBool,
    pub dom_ready: Mutex<Option<DomReadyCallback>>,
    pub scroll_step: AtomicI32,
    pub z_order: AtomicI32,
    pub gpu: Mutex<ViewGpuRefs>,
    pub staging: Mutex<StagingBuffer>,
    pub(crate) ops: Mutex<VecDeque<ViewOperation>>,
    pub(crate) in_flight: AtomicBool,
}

impl ViewEntry {
    pub fn new(id: ViewId, target: String, default_scroll_step: i32, z_order: i32) -> Self {
        Self {
            id,
            pending_load: Mutex::new(Some(target)),
            realized: AtomicBool::new(false),
            hidden: AtomicBool::new(false),
            loading_finished: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            new_frame_ready: AtomicBool::new(false),
            pending_resource_release: AtomicBool::new(false),
            dom_ready: Mutex::new(None),
            scroll_step: AtomicI32::new(default_scroll_step),
            z_order: AtomicI32::new(z_order),
            gpu: Mutex::new(ViewGpuRefs::default()),
            staging: Mutex::new(StagingBuffer::default()),
            ops: Mutex::new(VecDeque::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_realized(&self) -> bool {
        self.realized.load(Ordering::Acquire)
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::Acquire)
    }

    pub fn is_loading_finished(&self) -> bool {
        self.loading_finished.load(Ordering::Acquire)
    }
}

/// Registry of live views, keyed by [`ViewId`]. Lookups take a read lock;
/// create and destroy take the write lock briefly and never while calling
/// into the engine.
pub struct ViewRegistry {
    views: RwLock<HashMap<ViewId, Arc<ViewEntry>>>,
    retired: Mutex<HashSet<u64>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self {
            views: RwLock::new(HashMap::new()),
            retired: Mutex::new(HashSet::new()),
        }
    }

    /// Pick a fresh id: nonzero, not currently live, never used before.
    pub fn allocate_id(&self) -> ViewId {
        let views = self.views.read().unwrap();
        let retired = self.retired.lock().unwrap();
        let mut rng = rand::rng();
        loop {
            let candidate = rng.random::<u64>();
            if candidate == 0 {
                continue;
            }
            let id = ViewId(candidate);
            if !views.contains_key(&id) && !retired.contains(&candidate) {
                return id;
            }
        }
    }

    /// Insert a freshly allocated entry. Returns false if the id is already
    /// live or retired, in which case the caller must allocate again.
    pub fn insert(&self, entry: Arc<ViewEntry>) -> bool {
        let mut views = self.views.write().unwrap();
        let retired = self.retired.lock().unwrap();
        if retired.contains(&entry.id.0) || views.contains_key(&entry.id) {
            return false;
        }
        views.insert(entry.id, entry);
        true
    }

    pub fn get(&self, id: ViewId) -> Option<Arc<ViewEntry>> {
        self.views.read().unwrap().get(&id).cloned()
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.views.read().unwrap().contains_key(&id)
    }

    /// Remove a view and retire its id permanently.
    pub fn remove(&self, id: ViewId) -> Option<Arc<ViewEntry>> {
        let removed = self.views.write().unwrap().remove(&id);
        if removed.is_some() {
            self.retired.lock().unwrap().insert(id.0);
        }
        removed
    }

    /// Snapshot of live ids in ascending order.
    pub fn ids(&self) -> Vec<ViewId> {
        let mut ids: Vec<ViewId> = self.views.read().unwrap().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Snapshot of live entries.
    pub fn entries(&self) -> Vec<Arc<ViewEntry>> {
        self.views.read().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.views.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.read().unwrap().is_empty()
    }

    /// Z-order for the next created view: one above the current maximum.
    pub fn next_z_order(&self) -> i32 {
        self.views
            .read()
            .unwrap()
            .values()
            .map(|v| v.z_order.load(Ordering::Acquire))
            .max()
            .map(|max| max.saturating_add(1))
            .unwrap_or(0)
    }
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new()
    }
}
