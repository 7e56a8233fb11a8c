// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use super::session::PeelSession;
use super::{
    PeelMode, PeelReport, PeelTermination, PeelingScene, PeelingSettings, PeelingTarget,
    PlainBlendingReason,
};
use crate::capability::CapabilityQuery;
use crate::context::ContextGeneration;
use crate::hardware::TextureUnitAllocator;

/// Where the controller is in its per-frame cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PeelingState {
    /// No frame rendered and no support check run on the bound context yet.
    #[default]
    Idle,
    /// The support check ran against the bound context.
    Probing,
    /// Peeling layers.
    PeelingLoop,
    /// The last frame is finished and its report produced.
    Done,
}

/// Drives depth peeling for one context.
///
/// The support check runs once per context generation; the result is cached until the
/// bound context changes or the settings are replaced. Seeing a new generation, through
/// [`bind`](Self::bind) or through a query, drops the cache and returns the controller
/// to [`PeelingState::Idle`].
#[derive(Debug, Default)]
pub struct DepthPeelingController {
    settings: PeelingSettings,
    bound: Option<ContextGeneration>,
    support: Option<(ContextGeneration, bool)>,
    state: PeelingState,
}

impl DepthPeelingController {
    /// Creates a controller.
    pub fn new(settings: PeelingSettings) -> Self {
        Self {
            settings,
            bound: None,
            support: None,
            state: PeelingState::Idle,
        }
    }

    /// Follows a context bind. A different generation resets the controller.
    pub fn bind(&mut self, generation: ContextGeneration) {
        if self.bound != Some(generation) {
            self.reset(Some(generation));
        }
    }

    /// Follows a context unbind.
    pub fn unbind(&mut self) {
        self.reset(None);
    }

    fn reset(&mut self, bound: Option<ContextGeneration>) {
        if self.state != PeelingState::Idle {
            log::debug!("Depth peeling controller reset to idle");
        }
        self.bound = bound;
        self.support = None;
        self.state = PeelingState::Idle;
    }

    /// The active settings.
    pub fn settings(&self) -> &PeelingSettings {
        &self.settings
    }

    /// Replaces the settings. The support check runs again on the next frame.
    pub fn set_settings(&mut self, settings: PeelingSettings) {
        self.settings = settings;
        self.support = None;
    }

    /// The current state.
    pub fn state(&self) -> PeelingState {
        self.state
    }

    /// Whether every required capability is supported by the context behind `caps`.
    ///
    /// Only an uncached check moves the controller to [`PeelingState::Probing`].
    pub fn is_depth_peeling_supported(&mut self, caps: &dyn CapabilityQuery) -> bool {
        let Some(generation) = caps.generation() else {
            return false;
        };
        self.bind(generation);
        if let Some((cached, supported)) = self.support {
            if cached == generation {
                return supported;
            }
        }

        self.state = PeelingState::Probing;

        let missing: Vec<&str> = self
            .settings
            .required_capabilities
            .iter()
            .map(String::as_str)
            .filter(|token| !caps.supports(token))
            .collect();
        let supported = missing.is_empty();
        if supported {
            log::info!("Depth peeling supported on context {generation}");
        } else {
            log::info!(
                "Depth peeling unsupported on context {generation}, missing: {}",
                missing.join(" ")
            );
        }
        self.support = Some((generation, supported));
        supported
    }

    /// Renders one frame, peeling translucent geometry when possible.
    ///
    /// Never fails: running out of storage ends the loop early and the frame is
    /// finished with the layers captured so far.
    pub fn render_with_depth_peeling(
        &mut self,
        caps: &dyn CapabilityQuery,
        units: &mut TextureUnitAllocator,
        scene: &mut dyn PeelingScene,
        target: &mut dyn PeelingTarget,
    ) -> PeelReport {
        let report = if !self.is_depth_peeling_supported(caps) {
            Self::render_plain(scene, target, PlainBlendingReason::Unsupported)
        } else if !scene.has_translucent_geometry() {
            Self::render_plain(scene, target, PlainBlendingReason::NoTranslucentGeometry)
        } else {
            self.state = PeelingState::PeelingLoop;
            self.peel(units, scene, target)
        };
        self.state = PeelingState::Done;

        log::debug!(
            "Frame rendered with {} peeled layers ({:?}, {:?})",
            report.layers_rendered,
            report.mode,
            report.termination
        );
        report
    }

    fn render_plain(
        scene: &mut dyn PeelingScene,
        target: &mut dyn PeelingTarget,
        reason: PlainBlendingReason,
    ) -> PeelReport {
        scene.render_opaque();
        Self::render_plain_translucent(scene, target);
        PeelReport::plain(reason, None)
    }

    fn render_plain_translucent(scene: &mut dyn PeelingScene, target: &mut dyn PeelingTarget) {
        target.begin_plain_translucent();
        scene.render_translucent(None);
        target.end_plain_translucent();
    }

    fn peel(
        &self,
        units: &mut TextureUnitAllocator,
        scene: &mut dyn PeelingScene,
        target: &mut dyn PeelingTarget,
    ) -> PeelReport {
        let mut session = PeelSession::new();

        scene.render_opaque();
        match target.begin_peeling(units) {
            Ok(()) => session.mark_opaque_captured(),
            Err(err) => {
                log::warn!("Could not capture the opaque pass: {err}");
                session.terminate(PeelTermination::OutOfResources);
            }
        }

        if session.opaque_captured() {
            let threshold = self.settings.occlusion_threshold(target.viewport_pixels());
            let termination = self.peel_layers(&mut session, threshold, scene, target);
            session.terminate(termination);
            target.composite(session.layers());
            target.end_peeling(units);
        }

        let termination = session.termination();
        if session.layers_rendered() == 0
            && termination == Some(PeelTermination::OutOfResources)
        {
            Self::render_plain_translucent(scene, target);
            return PeelReport::plain(PlainBlendingReason::NoLayersComposited, termination);
        }

        PeelReport {
            layers_rendered: session.layers_rendered(),
            termination,
            mode: PeelMode::Peeled,
        }
    }

    fn peel_layers(
        &self,
        session: &mut PeelSession,
        threshold: u64,
        scene: &mut dyn PeelingScene,
        target: &mut dyn PeelingTarget,
    ) -> PeelTermination {
        loop {
            let layer = session.next_layer();
            let pass = match target.begin_layer(layer) {
                Ok(pass) => pass,
                Err(err) => {
                    log::info!("Peeling stopped at layer {layer}: {err}");
                    return PeelTermination::OutOfResources;
                }
            };

            let drawn = scene.render_translucent(Some(&pass));
            if layer == 0 && drawn == 0 {
                target.discard_layer(pass);
                return PeelTermination::NoGeometryLeft;
            }

            let fragments = target.end_layer(&pass);
            if fragments == 0 {
                target.discard_layer(pass);
                return PeelTermination::NoGeometryLeft;
            }
            session.accumulate(pass.handle);

            if fragments <= threshold {
                return PeelTermination::NoGeometryLeft;
            }
            if self.settings.layer_limit_reached(session.layers_rendered()) {
                return PeelTermination::LayerLimitReached;
            }
        }
    }
}
