//! `LivenessMonitorActor` — periodic sweep marking idle services disconnected
//! (spec §4.D). A pure timer actor: its `started()` hook installs
//! `ctx.run_interval`, the teacher's pattern for periodic actor work
//! (`SessionManagerActor::started`, `PresenceTrackingActor::started`).

use std::time::Duration;

use actix::prelude::*;
use tracing::debug;

use crate::store::{SessionStoreActor, SweepLiveness};

pub struct LivenessMonitorActor {
    store: Addr<SessionStoreActor>,
    sweep_period: Duration,
    inactivity_timeout: Duration,
}

impl LivenessMonitorActor {
    pub fn new(store: Addr<SessionStoreActor>, sweep_period: Duration, inactivity_timeout: Duration) -> Self {
        Self { store, sweep_period, inactivity_timeout }
    }
}

impl Actor for LivenessMonitorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let store = self.store.clone();
        let timeout = self.inactivity_timeout;
        ctx.run_interval(self.sweep_period, move |_act, _ctx| {
            debug!("liveness sweep tick");
            store.do_send(SweepLiveness { timeout });
        });
    }
}
