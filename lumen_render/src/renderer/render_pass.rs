/// Render pass orchestrator and the pass-object cache
///
/// A `RenderPass` collects draw commands for one render target and, on
/// encode, sequences binding transitions, attachment transitions, frame
/// buffer creation, begin-pass, per-command binding and drawing, and
/// end-pass into the encoder session.

use std::sync::{Arc, Mutex, Weak};

use rustc_hash::FxHashMap;
use scopeguard::ScopeGuard;

use crate::error::{Error, Result};
use crate::renderer::{
    clear_values, debug_group, encode_draw, transition_attachments, transition_bindings, Command,
    CommandEncoder, DebugObject, Device, FramebufferDesc, PassDescription, PassObject, Rect2D,
    RenderTarget, TrackedResource,
};
use crate::{engine_bail, engine_debug, engine_err, engine_error, engine_info};

// ============================================================================
// RenderPassCache
// ============================================================================

/// Pass objects keyed by their full description
///
/// Two targets with the same formats, sample counts, load/store policy and
/// layouts share one device pass object. Failed creations are not cached.
#[derive(Default)]
pub struct RenderPassCache {
    passes: Mutex<FxHashMap<PassDescription, Arc<dyn PassObject>>>,
}

impl RenderPassCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached pass object for `desc`, creating it on first use
    pub fn get_or_create(&self, device: &dyn Device, desc: &PassDescription) -> Result<Arc<dyn PassObject>> {
        let mut passes = self
            .passes
            .lock()
            .map_err(|_| engine_err!("lumen::RenderPassCache", "Pass cache lock poisoned"))?;

        if let Some(pass) = passes.get(desc) {
            if pass.is_valid() {
                return Ok(pass.clone());
            }
        }

        let pass = device.create_pass_object(desc)?;
        passes.insert(desc.clone(), pass.clone());
        engine_debug!(
            "lumen::RenderPassCache",
            "Created pass object with {} attachments ({} cached)",
            desc.attachments.len(),
            passes.len()
        );
        Ok(pass)
    }

    pub fn len(&self) -> usize {
        self.passes.lock().map(|passes| passes.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached pass object
    pub fn clear(&self) {
        if let Ok(mut passes) = self.passes.lock() {
            let count = passes.len();
            passes.clear();
            engine_info!("lumen::RenderPassCache", "Cleared {} pass objects", count);
        }
    }
}

// ============================================================================
// RenderPass
// ============================================================================

/// Lifecycle of a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// Pass object creation failed; every operation fails
    Invalid,
    /// Accepting commands
    Ready,
    /// Inside `encode_commands`
    Encoding,
    /// Encoded (successfully or not); cannot be encoded again
    Encoded,
}

/// One render pass over a render target
pub struct RenderPass {
    device: Arc<dyn Device>,
    target: RenderTarget,
    pass_object: Option<Arc<dyn PassObject>>,
    encoder: Weak<Mutex<dyn CommandEncoder>>,
    commands: Vec<Command>,
    label: String,
    state: PassState,
}

impl RenderPass {
    /// Create a pass over `target`, fetching its pass object from `cache`
    ///
    /// Failure to create the pass object is logged and leaves the pass
    /// permanently `Invalid`; check [`RenderPass::is_valid`].
    pub fn new(
        device: Arc<dyn Device>,
        cache: &RenderPassCache,
        target: RenderTarget,
        encoder: Weak<Mutex<dyn CommandEncoder>>,
    ) -> Self {
        let pass_object = PassDescription::from_render_target(&target)
            .and_then(|desc| cache.get_or_create(device.as_ref(), &desc));

        let (pass_object, state) = match pass_object {
            Ok(pass) => (Some(pass), PassState::Ready),
            Err(err) => {
                engine_error!("lumen::RenderPass", "Could not create render pass: {}", err);
                (None, PassState::Invalid)
            }
        };

        Self {
            device,
            target,
            pass_object,
            encoder,
            commands: Vec::new(),
            label: String::new(),
            state,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state != PassState::Invalid
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn render_target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Set the debug label and name the device pass object after it
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
        if let Some(pass) = &self.pass_object {
            self.device.set_debug_name(DebugObject::Pass(pass.as_ref()), &self.label);
        }
    }

    /// Queue a command for the next encode
    pub fn add_command(&mut self, command: Command) -> Result<()> {
        if self.state != PassState::Ready {
            engine_bail!(
                InvalidState,
                "lumen::RenderPass",
                "Cannot add a command to render pass '{}' in state {:?}",
                self.label,
                self.state
            );
        }
        self.commands.push(command);
        Ok(())
    }

    /// Encode every queued command into the encoder session
    ///
    /// The pass ends up `Encoded` whatever the outcome; a failed encode is
    /// not retried.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the pass is invalid or was already encoded
    /// - `PreconditionFailed` if there is no color attachment at index 0 or
    ///   the encoder has been dropped
    /// - any transition, binding or recording failure
    pub fn encode_commands(&mut self) -> Result<()> {
        if self.state != PassState::Ready {
            engine_bail!(
                InvalidState,
                "lumen::RenderPass",
                "Render pass '{}' cannot encode in state {:?}",
                self.label,
                self.state
            );
        }

        self.state = PassState::Encoding;
        let result = self.encode();
        self.state = PassState::Encoded;
        result
    }

    fn encode(&self) -> Result<()> {
        let pass_object = self
            .pass_object
            .as_ref()
            .ok_or_else(|| Error::InvalidState("render pass has no pass object".to_string()))?;

        if !self.target.has_color_attachment(0) {
            engine_bail!(
                PreconditionFailed,
                "lumen::RenderPass",
                "Render target doesn't have a color attachment at index 0"
            );
        }

        let Some(encoder) = self.encoder.upgrade() else {
            engine_bail!(
                PreconditionFailed,
                "lumen::RenderPass",
                "Command encoder died before commands could be encoded"
            );
        };
        let mut encoder = encoder
            .lock()
            .map_err(|_| engine_err!("lumen::RenderPass", "Command encoder lock poisoned"))?;
        if !encoder.is_valid() {
            engine_bail!(
                PreconditionFailed,
                "lumen::RenderPass",
                "Command encoder is no longer recording"
            );
        }

        let mut session = debug_group(&mut *encoder, &self.label);

        transition_bindings(&self.commands, &mut **session)?;
        transition_attachments(&self.target, &mut **session).map_err(|err| {
            engine_err!("lumen::RenderPass", "Could not complete attachment layout transitions: {}", err)
        })?;

        if self.commands.is_empty() {
            return Ok(());
        }

        let Some(target_size) = self.target.render_target_size() else {
            engine_bail!(PreconditionFailed, "lumen::RenderPass", "Render target has no size");
        };

        let framebuffer_desc = FramebufferDesc::from_render_target(&self.target)?;
        let framebuffer = self.device.create_framebuffer(pass_object.as_ref(), &framebuffer_desc)?;
        if !session.track(TrackedResource::Framebuffer(framebuffer.clone()))
            || !session.track(TrackedResource::PassObject(pass_object.clone()))
        {
            engine_bail!("lumen::RenderPass", "Could not track frame buffer and pass object");
        }

        let clears = clear_values(&self.target);
        session.command_list().begin_render_pass(
            pass_object.as_ref(),
            framebuffer.as_ref(),
            Rect2D::from_size(target_size),
            &clears,
        )?;

        let mut in_pass = scopeguard::guard(&mut **session, |encoder| {
            if let Err(err) = encoder.command_list().end_render_pass() {
                engine_error!("lumen::RenderPass", "Failed to end render pass: {}", err);
            }
        });

        for command in &self.commands {
            if command.pipeline.is_none() {
                continue;
            }
            encode_draw(self.device.as_ref(), &mut **in_pass, command, target_size)?;
        }

        ScopeGuard::into_inner(in_pass).command_list().end_render_pass()
    }
}

#[cfg(test)]
#[path = "render_pass_tests.rs"]
mod tests;
