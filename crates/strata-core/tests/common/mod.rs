#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::rc::Rc;

use strata_core::capability::DriverVersion;
use strata_core::{
    ContextKind, DriverIdentity, GraphicsContext, HardwareLimit, LayerHandle, LayerStorageError,
    PeelPass, PeelingScene, PeelingTarget, ProcAddress, TextureUnit, TextureUnitAllocator,
};

pub fn address(raw: usize) -> ProcAddress {
    ProcAddress::new(raw as *const c_void).expect("non-null test address")
}

#[derive(Debug)]
pub struct MockContext {
    pub kind: ContextKind,
    pub extensions: RefCell<Option<String>>,
    pub utility_extensions: Option<String>,
    pub platform_extensions: Option<String>,
    pub platform_version: Option<DriverVersion>,
    pub identity: RefCell<DriverIdentity>,
    pub direct: Cell<bool>,
    pub max_texture_units: Option<i32>,
    pub max_combined_units: Option<i32>,
    /// Number of `make_current` calls after which the context reports itself current.
    /// `None` means never.
    pub current_after: Option<u32>,
    pub make_current_calls: Cell<u32>,
    pub extension_queries: Cell<u32>,
}

impl MockContext {
    pub fn new(extensions: &str, version: &str) -> Self {
        Self {
            kind: ContextKind::Native,
            extensions: RefCell::new(Some(extensions.to_string())),
            utility_extensions: None,
            platform_extensions: None,
            platform_version: None,
            identity: RefCell::new(DriverIdentity::new("Mock Renderer", "Mock Vendor", version)),
            direct: Cell::new(true),
            max_texture_units: Some(4),
            max_combined_units: Some(16),
            current_after: Some(1),
            make_current_calls: Cell::new(0),
            extension_queries: Cell::new(0),
        }
    }

    pub fn with_identity(mut self, renderer: &str, vendor: &str, version: &str) -> Self {
        self.identity = RefCell::new(DriverIdentity::new(renderer, vendor, version));
        self
    }

    pub fn into_rc(self) -> Rc<dyn GraphicsContext> {
        Rc::new(self)
    }
}

impl GraphicsContext for MockContext {
    fn kind(&self) -> ContextKind {
        self.kind
    }

    fn make_current(&self) {
        self.make_current_calls.set(self.make_current_calls.get() + 1);
    }

    fn is_current(&self) -> bool {
        self.current_after
            .is_some_and(|needed| self.make_current_calls.get() >= needed)
    }

    fn is_direct_rendering(&self) -> bool {
        self.direct.get()
    }

    fn driver_identity(&self) -> DriverIdentity {
        self.identity.borrow().clone()
    }

    fn extension_list_string(&self) -> Option<String> {
        self.extension_queries.set(self.extension_queries.get() + 1);
        self.extensions.borrow().clone()
    }

    fn utility_extension_string(&self) -> Option<String> {
        self.utility_extensions.clone()
    }

    fn platform_extension_string(&self) -> Option<String> {
        self.platform_extensions.clone()
    }

    fn platform_version(&self) -> Option<DriverVersion> {
        self.platform_version
    }

    fn query_integer(&self, limit: HardwareLimit) -> Option<i32> {
        match limit {
            HardwareLimit::MaxTextureUnits => self.max_texture_units,
            HardwareLimit::MaxCombinedTextureImageUnits => self.max_combined_units,
        }
    }
}

/// A scene whose translucent props disappear one peel at a time.
#[derive(Debug, Default)]
pub struct MockScene {
    pub translucent_props: usize,
    /// Peeled passes draw nothing, as if every prop were culled.
    pub culled_when_peeling: bool,
    pub opaque_passes: u32,
    pub peeled_passes: Vec<u32>,
    pub plain_passes: u32,
}

impl MockScene {
    pub fn with_translucent(props: usize) -> Self {
        Self {
            translucent_props: props,
            ..Default::default()
        }
    }
}

impl PeelingScene for MockScene {
    fn has_translucent_geometry(&self) -> bool {
        self.translucent_props > 0
    }

    fn render_opaque(&mut self) {
        self.opaque_passes += 1;
    }

    fn render_translucent(&mut self, pass: Option<&PeelPass>) -> usize {
        match pass {
            Some(pass) => {
                self.peeled_passes.push(pass.layer);
                if self.culled_when_peeling {
                    0
                } else {
                    self.translucent_props
                }
            }
            None => {
                self.plain_passes += 1;
                self.translucent_props
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEvent {
    BeginPeeling,
    BeginLayer(u32),
    EndLayer(u32),
    DiscardLayer(u32),
    Composite(Vec<LayerHandle>),
    EndPeeling,
    BeginPlain,
    EndPlain,
}

/// A peeling target with scripted fragment counts and an optional storage limit.
#[derive(Debug)]
pub struct MockTarget {
    /// Fragments peeled by layer `n`; layers past the end peel nothing.
    pub fragments: Vec<u64>,
    /// `begin_layer` fails from this layer on.
    pub exhausted_at: Option<u32>,
    pub fail_begin_peeling: bool,
    pub units_needed: usize,
    pub viewport: u64,
    pub held_units: Vec<TextureUnit>,
    pub events: Vec<TargetEvent>,
}

impl MockTarget {
    pub fn new(fragments: Vec<u64>) -> Self {
        Self {
            fragments,
            exhausted_at: None,
            fail_begin_peeling: false,
            units_needed: 2,
            viewport: 100 * 100,
            held_units: Vec::new(),
            events: Vec::new(),
        }
    }
}

impl PeelingTarget for MockTarget {
    fn begin_peeling(&mut self, units: &mut TextureUnitAllocator) -> Result<(), LayerStorageError> {
        self.events.push(TargetEvent::BeginPeeling);
        if self.fail_begin_peeling {
            return Err(LayerStorageError::OutOfMemory { layer: None });
        }
        for _ in 0..self.units_needed {
            match units.acquire() {
                Some(unit) => self.held_units.push(unit),
                None => {
                    for unit in self.held_units.drain(..) {
                        units.release(unit).expect("unit was acquired");
                    }
                    return Err(LayerStorageError::TextureUnitsExhausted {
                        required: self.units_needed,
                    });
                }
            }
        }
        Ok(())
    }

    fn begin_layer(&mut self, layer: u32) -> Result<PeelPass, LayerStorageError> {
        self.events.push(TargetEvent::BeginLayer(layer));
        if self.exhausted_at.is_some_and(|limit| layer >= limit) {
            return Err(LayerStorageError::OutOfMemory { layer: Some(layer) });
        }
        Ok(PeelPass {
            layer,
            handle: LayerHandle(u64::from(layer) + 100),
            opaque_depth_unit: self.held_units.first().copied(),
            previous_depth_unit: (layer > 0).then(|| self.held_units.get(1).copied()).flatten(),
        })
    }

    fn end_layer(&mut self, pass: &PeelPass) -> u64 {
        self.events.push(TargetEvent::EndLayer(pass.layer));
        self.fragments.get(pass.layer as usize).copied().unwrap_or(0)
    }

    fn discard_layer(&mut self, pass: PeelPass) {
        self.events.push(TargetEvent::DiscardLayer(pass.layer));
    }

    fn composite(&mut self, layers: &[LayerHandle]) {
        self.events.push(TargetEvent::Composite(layers.to_vec()));
    }

    fn viewport_pixels(&self) -> u64 {
        self.viewport
    }

    fn end_peeling(&mut self, units: &mut TextureUnitAllocator) {
        self.events.push(TargetEvent::EndPeeling);
        for unit in self.held_units.drain(..) {
            units.release(unit).expect("unit was acquired");
        }
    }

    fn begin_plain_translucent(&mut self) {
        self.events.push(TargetEvent::BeginPlain);
    }

    fn end_plain_translucent(&mut self) {
        self.events.push(TargetEvent::EndPlain);
    }
}
