//! Tag discovery state machine.
//!
//! One [`TagFinder::poll`] call per scheduling tick: poll the RF worker,
//! classify whatever tag showed up, light the matching indicator, and - if
//! a host command has armed the write gate and the tag is NFC-V - run the
//! command dispatcher against it. Absence of a tag is a no-op iteration,
//! never an error.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;
use embedded_io_async::Write;

use crate::command::{process_command, HostMessage};
use crate::controller::RfController;
use crate::models::ProductProfile;
use crate::retry::RetryPolicy;
use crate::tag::{TagSession, TagTech, TagUid};
use crate::{debug, error, info};

/// Single-slot channel between the asynchronous host receive handler and
/// the polling loop. A second arrival before consumption overwrites the
/// slot; the loop drains and clears it atomically each cycle.
pub type HostMailbox = Signal<CriticalSectionRawMutex, HostMessage>;

/// Discovery machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryState {
    /// RF stack not brought up yet; polling does nothing.
    NotInitialized,
    /// Restart point: indicators off, session dropped, discovery restarted.
    StartDiscovery,
    /// Waiting for the worker to report an activated device.
    Discovery,
}

/// Per-technology indicator outputs plus the field indicator.
pub struct Indicators<P: OutputPin> {
    pub nfca: P,
    pub nfcb: P,
    pub nfcf: P,
    pub nfcv: P,
    pub ap2p: P,
    pub field: P,
}

impl<P: OutputPin> Indicators<P> {
    fn all_off(&mut self) {
        self.nfca.set_low().ok();
        self.nfcb.set_low().ok();
        self.nfcf.set_low().ok();
        self.nfcv.set_low().ok();
        self.ap2p.set_low().ok();
        self.field.set_low().ok();
    }

    fn show(&mut self, tech: TagTech) {
        match tech {
            TagTech::NfcV => self.nfcv.set_high(),
            TagTech::NfcA => self.nfca.set_high(),
            // ST25TB tags share the NFC-B indicator
            TagTech::NfcB | TagTech::St25tb => self.nfcb.set_high(),
            TagTech::NfcF => self.nfcf.set_high(),
            TagTech::Ap2p => self.ap2p.set_high(),
        }
        .ok();
        self.field.set_high().ok();
    }
}

/// Delays applied around a handled tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollTiming {
    /// Pause after deactivating a handled tag, so other readers in the
    /// field are not flooded with re-discoveries of the same tag. Zero
    /// disables the pause.
    pub rediscover_delay: Duration,
    /// Pause before the `PASS`/`FAIL` reply so the fixture can catch up.
    pub host_ack_delay: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            rediscover_delay: Duration::from_millis(500),
            host_ack_delay: Duration::from_secs(1),
        }
    }
}

/// The discovery state machine plus everything a dispatched command needs.
pub struct TagFinder<'a, C: RfController, TX: Write, P: OutputPin> {
    rf: C,
    host_rx: &'a HostMailbox,
    host_tx: TX,
    indicators: Indicators<P>,
    profile: &'a ProductProfile,
    policy: RetryPolicy,
    timing: PollTiming,
    state: DiscoveryState,
    armed: Option<HostMessage>,
    last_uid: Option<TagUid>,
}

impl<'a, C: RfController, TX: Write, P: OutputPin> TagFinder<'a, C, TX, P> {
    pub fn new(
        rf: C,
        host_rx: &'a HostMailbox,
        host_tx: TX,
        indicators: Indicators<P>,
        profile: &'a ProductProfile,
    ) -> Self {
        Self {
            rf,
            host_rx,
            host_tx,
            indicators,
            profile,
            policy: RetryPolicy::default(),
            timing: PollTiming::default(),
            state: DiscoveryState::NotInitialized,
            armed: None,
            last_uid: None,
        }
    }

    /// Overrides the per-transaction retry budget.
    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    /// Overrides the poll-cycle delays.
    pub fn set_timing(&mut self, timing: PollTiming) {
        self.timing = timing;
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// True while a host command waits for the next NFC-V tag.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Brings up the RF stack and validates the discovery configuration
    /// with one discover/deactivate cycle. Leaves the machine in
    /// [`DiscoveryState::StartDiscovery`].
    pub async fn init(&mut self) -> Result<(), C::Error> {
        self.rf.initialize().await?;
        self.rf.start_discovery().await?;
        self.rf.deactivate().await;
        self.state = DiscoveryState::StartDiscovery;
        info!("tag finder initialized");
        Ok(())
    }

    /// One state machine iteration. Must be called periodically; it never
    /// blocks waiting for a tag.
    pub async fn poll(&mut self) -> Result<(), C::Error> {
        // Host message arrival overrides whatever state the machine is in
        // and arms the write gate for the next NFC-V tag.
        if let Some(msg) = self.host_rx.try_take() {
            debug!("host message received: {:?}", msg.command);
            self.state = DiscoveryState::StartDiscovery;
            self.armed = Some(msg);
        }

        match self.state {
            DiscoveryState::NotInitialized => {}
            DiscoveryState::StartDiscovery => {
                self.indicators.all_off();
                self.rf.deactivate().await;
                self.rf.start_discovery().await?;
                self.state = DiscoveryState::Discovery;
            }
            DiscoveryState::Discovery => {
                if let Some(session) = self.rf.poll_activated().await {
                    self.handle_session(session).await;
                    self.rf.deactivate().await;
                    if self.timing.rediscover_delay.as_ticks() > 0 {
                        Timer::after(self.timing.rediscover_delay).await;
                    }
                    self.state = DiscoveryState::StartDiscovery;
                }
            }
        }
        Ok(())
    }

    /// Polls forever. A failed cycle is logged and polling continues; the
    /// device never stops scanning for tags.
    pub async fn run(&mut self) -> ! {
        loop {
            if self.poll().await.is_err() {
                error!("discovery cycle failed, restarting");
                self.state = DiscoveryState::StartDiscovery;
            }
        }
    }

    async fn handle_session(&mut self, session: TagSession) {
        self.indicators.show(session.tech);

        if session.tech != TagTech::NfcV {
            debug!("{:?} device activated, nothing to do", session.tech);
            return;
        }

        if self.last_uid != Some(session.uid) {
            info!("ISO15693/NFC-V tag found, uid {:?}", session.uid.as_bytes());
            self.last_uid = Some(session.uid);
        }

        if let Some(msg) = self.armed.take() {
            let outcome = process_command(
                &mut self.rf,
                &mut self.host_tx,
                &session,
                msg,
                self.profile,
                self.policy,
                self.timing.host_ack_delay,
            )
            .await;
            debug!("command dispatched: {:?}", outcome);
        }
    }
}
