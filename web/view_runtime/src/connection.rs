use crate::context::ViewContext;
use crate::dispatch::{Applied, Dispatcher, InboundEvent};
use crate::error::{Result, SyncError};
use crate::protocol::ServerEnvelope;
use crate::session::Session;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, SyncSender};
use std::thread::{self, JoinHandle};
use tracing::{error, info};

pub trait View: Send + 'static {
    fn handle(&mut self, ctx: &mut ViewContext<'_>) -> Result<()>;
}

pub struct FnView<F>(F);

pub fn view_fn<F>(handler: F) -> FnView<F>
where
    F: FnMut(&mut ViewContext<'_>) -> Result<()> + Send + 'static,
{
    FnView(handler)
}

impl<F> View for FnView<F>
where
    F: FnMut(&mut ViewContext<'_>) -> Result<()> + Send + 'static,
{
    fn handle(&mut self, ctx: &mut ViewContext<'_>) -> Result<()> {
        (self.0)(ctx)
    }
}

pub struct Connection {
    session: Arc<Session>,
    dispatcher: Dispatcher,
    view: JoinHandle<Result<()>>,
}

impl Connection {
    /// Returns once the view holds the session, so later events see the
    /// tree it builds.
    pub fn open<V: View>(
        sid: impl Into<String>,
        mut view: V,
        outbound: SyncSender<ServerEnvelope>,
    ) -> Result<Self> {
        let sid = sid.into();
        let session = Arc::new(Session::new(sid.clone(), outbound));
        let view_session = Arc::clone(&session);
        let (entered_tx, entered_rx) = mpsc::sync_channel(1);

        let view = thread::Builder::new()
            .name(format!("view-{sid}"))
            .spawn(move || {
                let mut ctx = ViewContext::enter(&view_session);
                entered_tx.send(()).ok();
                // ctx stays outside the unwind so its guard is never poisoned.
                let result = panic::catch_unwind(AssertUnwindSafe(|| view.handle(&mut ctx)))
                    .unwrap_or_else(|_| {
                        error!(sid = %view_session.sid(), "view panicked");
                        Err(SyncError::ViewPanicked)
                    });
                drop(ctx);

                if let Err(err) = &result {
                    if !matches!(err, SyncError::ConnectionClosed) {
                        view_session.report_failure(err);
                    }
                }
                result
            })?;

        // Disconnected means the view thread died before entering.
        entered_rx.recv().ok();
        info!(%sid, "connection opened");
        Ok(Self {
            dispatcher: Dispatcher::new(Arc::clone(&session)),
            session,
            view,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn dispatch(&self, event: InboundEvent) -> Result<Applied> {
        self.dispatcher.dispatch(event)
    }

    pub fn close(&self) {
        self.session.close();
    }

    pub fn join(self) -> Result<()> {
        let Connection { session, view, .. } = self;
        let result = view.join().unwrap_or(Err(SyncError::ViewPanicked));
        info!(sid = %session.sid(), ok = result.is_ok(), "view finished");
        result
    }
}
