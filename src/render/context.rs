//! Context tracking.
//!
//! Every GPU call requires a native context bound to the calling thread.
//! Centralizing that here lets the rest of the runtime call
//! [`Context::ensure`] defensively before touching the driver instead of
//! scattering platform-specific context management.
//!
//! The runtime never creates windows itself: the embedder either wraps an
//! existing native context with [`Context::from_parts`], or installs a
//! [`ContextProvider`] so [`Context::ensure`] can create a default context on
//! demand (the provider typically builds a hidden surface).

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::errors::{Result, VitrailError};
use crate::gl::Device;
use crate::render::shader;

/// Identity of a context, unique for the lifetime of the process (ids are
/// never reused). The program-binding cache is keyed by this.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ContextId(u32);

/// Platform half of a context: binding it to the calling thread and
/// presenting the backbuffer. Implemented by the window/surface provider
/// (glutin, SDL, EGL, ...).
pub trait ContextBackend {
    /// Binds the native context to the calling thread.
    fn make_current(&self) -> Result<()>;

    /// Swaps the backbuffer. Off-screen backends keep the default no-op.
    fn swap_buffers(&self) -> Result<()> {
        Ok(())
    }
}

/// Backend for contexts with no presentable surface (tests, compute-style
/// use). `make_current` is a no-op: the embedder guarantees currency.
pub struct HeadlessBackend;

impl ContextBackend for HeadlessBackend {
    fn make_current(&self) -> Result<()> {
        Ok(())
    }
}

/// Factory for default contexts, installed once by the embedder.
pub trait ContextProvider: Send + Sync {
    /// Creates a fresh native context and the device talking to it.
    fn create(&self) -> Result<(Arc<dyn Device>, Box<dyn ContextBackend>)>;
}

static PROVIDER: RwLock<Option<Box<dyn ContextProvider>>> = RwLock::new(None);
static NEXT_CONTEXT_ID: AtomicU32 = AtomicU32::new(1);

thread_local! {
    static CURRENT: RefCell<Option<Rc<Context>>> = const { RefCell::new(None) };
}

/// Installs the process-wide [`ContextProvider`] used by [`Context::ensure`]
/// and [`Context::create`]. Replaces any previously installed provider.
pub fn set_context_provider(provider: impl ContextProvider + 'static) {
    *PROVIDER.write() = Some(Box::new(provider));
}

/// Removes the installed provider. Until a new one is installed,
/// [`Context::ensure`] and [`Context::create`] fail with
/// [`VitrailError::NoContext`] on threads with no current context.
pub fn clear_context_provider() {
    *PROVIDER.write() = None;
}

/// A native graphics context paired with its [`Device`].
///
/// Contexts are reference counted through `Rc`: the last handle dropping
/// releases the native resources and invalidates the program-binding cache.
/// At most one context is current per thread at a time.
pub struct Context {
    id: ContextId,
    device: Arc<dyn Device>,
    backend: Box<dyn ContextBackend>,
}

impl Context {
    /// Wraps an existing native context. The backend must refer to the same
    /// native context the device's function pointers were loaded against.
    pub fn from_parts(device: Arc<dyn Device>, backend: Box<dyn ContextBackend>) -> Rc<Self> {
        let id = ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
        log::debug!("created context {id:?}");
        Rc::new(Self {
            id,
            device,
            backend,
        })
    }

    /// Creates a context through the installed [`ContextProvider`].
    pub fn create() -> Result<Rc<Self>> {
        let provider = PROVIDER.read();
        let provider = provider.as_ref().ok_or(VitrailError::NoContext)?;
        let (device, backend) = provider.create()?;
        Ok(Self::from_parts(device, backend))
    }

    /// Guarantees a valid current context on this thread, creating and
    /// binding a default one if none is current.
    pub fn ensure() -> Result<Rc<Self>> {
        if let Some(context) = Self::current() {
            return Ok(context);
        }
        let context = Self::create()?;
        context.make_current()?;
        Ok(context)
    }

    /// The context bound to the calling thread, if any.
    #[must_use]
    pub fn current() -> Option<Rc<Self>> {
        CURRENT.with(|slot| slot.borrow().clone())
    }

    /// Binds the receiver to the calling thread.
    pub fn make_current(self: &Rc<Self>) -> Result<()> {
        self.backend.make_current()?;
        CURRENT.with(|slot| *slot.borrow_mut() = Some(Rc::clone(self)));
        Ok(())
    }

    /// Clears this thread's current context without destroying it.
    pub fn clear_current() {
        CURRENT.with(|slot| *slot.borrow_mut() = None);
    }

    /// Presents the backbuffer.
    pub fn update(&self) -> Result<()> {
        self.backend.swap_buffers()
    }

    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[must_use]
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        // A destroyed context invalidates any cached "current program": the
        // cache pair must never match against driver state that no longer
        // exists. See the shader module's binding cache.
        shader::invalidate_program_binding();
        log::debug!("destroyed context {:?}", self.id);
    }
}
