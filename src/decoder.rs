//! Signal decoder that ties everything together.
//!
//! This module provides [`SignalDecoder`], the context object that owns the
//! CV store, the runtime state of every mast and the light bank.
//!
//! # Overview
//!
//! The decoder:
//! - Resolves accessory commands to a mast and a code
//! - Debounces codes per mast and commits them as aspects
//! - Fans committed aspects out to the mast's light outputs
//! - Advances blink cadences and packs output frames for the driver
//! - Validates and persists configuration writes
//!
//! # Example
//!
//! ```rust
//! use rs_signals::{SignalDecoder, hal::{MockOutputs, RamCvStore}};
//! use rs_signals::catalog::csd;
//!
//! let mut decoder = SignalDecoder::new(RamCvStore::new());
//! decoder.start().unwrap(); // writes factory defaults on a blank store
//!
//! // First mast listens on address 100; bit 0 set = code 1
//! decoder.on_address_command(100, 1, 0);
//! assert_eq!(decoder.mast(0).unwrap().current_aspect(), csd::STOP);
//!
//! // Main loop - call tick() regularly
//! let report = decoder.tick(200);
//! assert_eq!(report.settled.len(), 1);
//! assert_eq!(decoder.mast(0).unwrap().current_aspect(), csd::CLEAR);
//!
//! let mut outputs = MockOutputs::new();
//! decoder.drive(&mut outputs).unwrap();
//! assert!(outputs.is_lit(0)); // green light of mast 0
//! ```

use heapless::Vec;

use crate::addressing::{code_from_command, normalize_address, AddressMap, ControlStyle};
use crate::catalog::{self, TYPE_INDEX_MASK, USES_CODES};
use crate::config::DecoderConfig;
use crate::error::ConfigError;
use crate::layout::{
    self, aspect_table_cv, mast_record_cv, number_to_phys_output, MastSettings,
    MAX_ASPECTS, MAX_OUTPUTS_PER_MAST, NUM_OUTPUTS, NUM_SIGNAL_MAST,
};
use crate::light::{LightBank, LightFunction, OutputFrame};
use crate::mast::{MastState, SignalMastData};
use crate::traits::{CvStore, OutputDriver};

/// A code accepted as pending by a mast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodeWrite {
    /// Mast index.
    pub mast: usize,
    /// Pending code after the command.
    pub code: u8,
}

/// A code that settled during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SettledAspect {
    /// Mast index.
    pub mast: usize,
    /// Settled code.
    pub code: u8,
    /// Aspect now shown.
    pub aspect: u8,
}

/// What happened during one [`SignalDecoder::tick`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Masts that committed a new aspect.
    pub settled: Vec<SettledAspect, NUM_SIGNAL_MAST>,
    /// Lights that toggled their blink phase.
    pub toggled: usize,
}

type ConfigResult<S> = Result<(), ConfigError<<S as CvStore>::Error>>;

/// The signal decoder.
///
/// # Type Parameter
///
/// - `S`: The CV storage ([`CvStore`] trait)
///
/// # Thread Safety
///
/// The decoder is not thread-safe and is driven from a single loop:
/// feed it commands with [`on_address_command`](Self::on_address_command)
/// and call [`tick`](Self::tick) regularly.
pub struct SignalDecoder<S: CvStore> {
    cvs: S,
    config: DecoderConfig,
    masts: [SignalMastData; NUM_SIGNAL_MAST],
    outputs: [[Option<u8>; MAX_OUTPUTS_PER_MAST]; NUM_SIGNAL_MAST],
    address_map: AddressMap,
    lights: LightBank,
}

impl<S: CvStore> SignalDecoder<S> {
    /// Create a decoder from the configuration in `cvs`.
    ///
    /// The store is used as is; call [`start`](Self::start) to initialize a
    /// blank store.
    pub fn new(cvs: S) -> Self {
        let mut decoder = Self {
            cvs,
            config: DecoderConfig::default(),
            masts: [SignalMastData::default(); NUM_SIGNAL_MAST],
            outputs: [[None; MAX_OUTPUTS_PER_MAST]; NUM_SIGNAL_MAST],
            address_map: AddressMap::default(),
            lights: LightBank::new(),
        };
        decoder.reload();
        decoder
    }

    /// Write factory defaults if the store was never initialized, then load.
    pub fn start(&mut self) -> Result<(), S::Error> {
        if layout::needs_factory_reset(&self.cvs) {
            self.factory_reset()?;
        } else {
            self.reload();
        }
        Ok(())
    }

    /// Overwrite the configuration with factory defaults and reload.
    ///
    /// The defaults leave the decoder unlocked.
    pub fn factory_reset(&mut self) -> Result<(), S::Error> {
        layout::write_factory_defaults(&mut self.cvs)?;
        self.reload();
        Ok(())
    }

    /// Reload all state from the CVs.
    ///
    /// Pending codes are dropped and every mast returns to its default aspect.
    pub fn reload(&mut self) {
        self.config = DecoderConfig::from_cvs(&self.cvs);
        let count = self.mast_count();
        log::info!(
            "Loading {} masts from address {}",
            count,
            self.config.first_address
        );

        let mut owners: [Option<(usize, usize)>; NUM_OUTPUTS] = [None; NUM_OUTPUTS];
        for mast in 0..NUM_SIGNAL_MAST {
            self.outputs[mast] = [None; MAX_OUTPUTS_PER_MAST];
            if mast >= count {
                self.masts[mast] = SignalMastData::default();
                continue;
            }
            self.masts[mast] = SignalMastData::from_settings(&self.cvs, mast);

            let settings = MastSettings::read(&self.cvs, mast);
            for (slot, &number) in settings.outputs.iter().enumerate() {
                let Some(output) = number_to_phys_output(number) else {
                    continue;
                };
                match owners[usize::from(output)] {
                    Some((owner, owner_slot)) => log::warn!(
                        "Mast {} light {}: output {} already used by mast {} light {}, ignored",
                        mast,
                        slot,
                        number,
                        owner,
                        owner_slot
                    ),
                    None => {
                        owners[usize::from(output)] = Some((mast, slot));
                        self.outputs[mast][slot] = Some(output);
                    }
                }
            }
        }

        let mut counts = [0u8; NUM_SIGNAL_MAST];
        for (slot, data) in counts.iter_mut().zip(self.masts.iter()).take(count) {
            *slot = data.address_count();
        }
        self.address_map = AddressMap::new(self.config.first_address, &counts[..count]);

        self.lights.reset();
        for mast in 0..count {
            let data = self.masts[mast];
            self.show(mast, data.current_code(), data.current_aspect());
        }
    }

    // ========================================================================
    // Runtime
    // ========================================================================

    /// Handle an accessory command.
    ///
    /// Returns the pending code if a mast accepted the command. Addresses no
    /// mast listens on and codes the mast cannot show are ignored.
    pub fn on_address_command(&mut self, address: u16, value: u8, now_ms: u64) -> Option<CodeWrite> {
        let address = normalize_address(address, self.config.roco_addressing);
        let target = self.address_map.resolve(address)?;
        let mast = self.masts.get_mut(target.mast)?;

        let style = mast.control_style();
        let code = code_from_command(style, target.offset, value, mast.base_code())?;
        // Bitwise codes are built over several commands; the range is checked at settle
        if style != ControlStyle::Bitwise && !mast.accepts_code(code) {
            log::debug!("Mast {}: code {} out of range, ignored", target.mast, code);
            return None;
        }

        mast.set_code(code, now_ms);
        Some(CodeWrite {
            mast: target.mast,
            code,
        })
    }

    /// Settle pending codes and advance the blink cadences.
    ///
    /// Every mast is checked for a settled code before the lights advance.
    pub fn tick(&mut self, now_ms: u64) -> TickReport {
        let mut report = TickReport::default();
        let lag = self.config.aspect_lag;

        for mast in 0..self.mast_count() {
            if !self.masts[mast].is_ready_for_process(now_ms, lag) {
                continue;
            }
            let code = self.masts[mast].processed();
            if !self.masts[mast].accepts_code(code) {
                log::warn!("Mast {}: settled code {} out of range, discarded", mast, code);
                continue;
            }
            let aspect = self.masts[mast].translate(&self.cvs, mast, code);
            let aspect = self.show(mast, code, aspect);
            log::debug!("Mast {}: code {} settled, aspect {}", mast, code, aspect);
            // One entry per mast at most
            let _ = report.settled.push(SettledAspect { mast, code, aspect });
        }

        report.toggled = self.lights.advance(now_ms);
        report
    }

    /// Commit `aspect` and fan it out to the mast's lights. Returns the aspect shown.
    fn show(&mut self, mast: usize, code: u8, aspect: u8) -> u8 {
        let set = self.masts[mast].signal_set();
        let mut aspect = aspect;
        if aspect != 0 && aspect >= set.aspect_count() {
            log::warn!("Mast {}: aspect {} not in {:?}, showing stop", mast, aspect, set);
            aspect = 0;
        }
        self.masts[mast].commit(code, aspect);

        let pattern = set.aspect_pattern(aspect);
        for (slot, output) in self.outputs[mast].iter().enumerate() {
            let Some(output) = output else {
                continue;
            };
            let light = pattern
                .map(|p| LightFunction::from_pattern(p[slot]))
                .unwrap_or_default();
            self.lights.assign(usize::from(*output), light);
        }
        aspect
    }

    /// Show an aspect at once, discarding a pending code.
    ///
    /// Catalog masts record the first code translating to `aspect` (or keep
    /// their code if none does).
    pub fn change_aspect(&mut self, mast: usize, aspect: u8) -> ConfigResult<S> {
        let data = *self.mast(mast).ok_or(ConfigError::InvalidMast(mast))?;
        if aspect >= data.signal_set().aspect_count() {
            return Err(ConfigError::InvalidAspect(aspect));
        }

        let code = self
            .aspect_jmri(mast, aspect)
            .unwrap_or(data.current_code());
        self.masts[mast].processed();
        self.show(mast, code, aspect);
        log::debug!("Mast {}: aspect {} set directly", mast, aspect);
        Ok(())
    }

    /// JMRI aspect number of a mast aspect.
    ///
    /// JMRI numbers the aspects of a mast by the code it sends for them:
    /// the first code translating to `aspect` on catalog masts, the aspect
    /// itself on signal set masts. `None` if no code shows the aspect.
    pub fn aspect_jmri(&self, mast: usize, aspect: u8) -> Option<u8> {
        let data = self.mast(mast)?;
        if aspect >= data.signal_set().aspect_count() {
            return None;
        }
        if !data.uses_codes() {
            return Some(aspect);
        }
        (0..data.code_count()).find(|&code| data.translate(&self.cvs, mast, code) == aspect)
    }

    /// Aspect a code would show on a mast.
    pub fn translate_code(&self, mast: usize, code: u8) -> Option<u8> {
        let data = self.masts.get(mast).filter(|_| mast < self.mast_count())?;
        data.accepts_code(code)
            .then(|| data.translate(&self.cvs, mast, code))
    }

    // ========================================================================
    // Outputs
    // ========================================================================

    /// Light state of a physical output.
    pub fn current_output_state(&self, output: usize) -> LightFunction {
        self.lights.get(output)
    }

    /// True if the output should be driven now, overrides included.
    pub fn is_output_lit(&self, output: usize) -> bool {
        self.lights.is_lit(output)
    }

    /// Packed on/off state of all outputs.
    pub fn output_frame(&self) -> OutputFrame {
        self.lights.frame()
    }

    /// Push the fade rate and the current output frame to a driver.
    pub fn drive<D: OutputDriver>(&self, driver: &mut D) -> Result<(), D::Error> {
        driver.set_fade_rate(self.config.fade_rate)?;
        driver.write_outputs(&self.lights.frame())
    }

    /// Force an output lit (lamp test). Not persisted.
    pub fn set_override(&mut self, output: usize, on: bool) -> bool {
        self.lights.set_override(output, on)
    }

    /// Drop all output overrides.
    pub fn clear_overrides(&mut self) {
        self.lights.clear_overrides();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Runtime state of an active mast.
    pub fn mast(&self, mast: usize) -> Option<&SignalMastData> {
        self.masts.get(mast).filter(|_| mast < self.mast_count())
    }

    /// Snapshot of an active mast.
    pub fn mast_state(&self, mast: usize) -> Option<MastState> {
        self.mast(mast).map(|data| data.state(mast))
    }

    /// Physical output of a mast light, after alias resolution.
    pub fn mast_output(&self, mast: usize, light: usize) -> Option<u8> {
        *self.outputs.get(mast)?.get(light)?
    }

    /// Number of active masts.
    pub fn mast_count(&self) -> usize {
        usize::from(self.config.mast_count).min(NUM_SIGNAL_MAST)
    }

    /// Global configuration in effect.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Addresses of the active masts.
    pub fn address_map(&self) -> &AddressMap {
        &self.address_map
    }

    /// The CV store.
    pub fn cv_store(&self) -> &S {
        &self.cvs
    }

    /// Consume the decoder and return the CV store.
    pub fn into_cv_store(self) -> S {
        self.cvs
    }

    // ========================================================================
    // Configuration Writes
    // ========================================================================

    fn active_mast(&self, mast: usize) -> Result<SignalMastData, ConfigError<S::Error>> {
        self.unlocked()?;
        self.mast(mast).copied().ok_or(ConfigError::InvalidMast(mast))
    }

    fn unlocked(&self) -> ConfigResult<S> {
        if self.config.is_locked() {
            log::warn!("Configuration write refused, decoder locked");
            return Err(ConfigError::Locked);
        }
        Ok(())
    }

    /// Write the decoder key. Allowed while locked, so a matching key
    /// unlocks the configuration writes.
    pub fn set_decoder_key(&mut self, key: u8) -> ConfigResult<S> {
        self.cvs
            .write_cv(layout::CV_DECODER_KEY, key)
            .map_err(ConfigError::Storage)?;
        self.reload();
        Ok(())
    }

    /// Change a mast's type byte.
    ///
    /// Resets the address count and default, rewires catalog masts from
    /// their prototype (keeping existing wiring where it fits) and rewrites
    /// the aspect table.
    pub fn set_mast_type(&mut self, mast: usize, signal_set_or_mast_type: u8) -> ConfigResult<S> {
        self.unlocked()?;
        if mast >= NUM_SIGNAL_MAST {
            return Err(ConfigError::InvalidMast(mast));
        }
        let index = signal_set_or_mast_type & TYPE_INDEX_MASK;
        let uses_codes = signal_set_or_mast_type & USES_CODES != 0;
        let valid = if uses_codes {
            catalog::to_template_index(index) == index
        } else {
            catalog::to_signal_set_index(index) == index
        };
        if !valid {
            return Err(ConfigError::InvalidMastType(signal_set_or_mast_type));
        }

        let mut settings = MastSettings::read(&self.cvs, mast);
        settings.signal_set_or_mast_type = signal_set_or_mast_type;
        settings.addresses = 0;
        settings.default_code_or_aspect = 0;
        if uses_codes {
            settings.default_code_or_aspect = catalog::lookup(index).default_code;
        }
        settings
            .write(&mut self.cvs, mast)
            .map_err(ConfigError::Storage)?;

        if uses_codes {
            layout::save_template_outputs_to_cvs(&mut self.cvs, catalog::lookup(index), mast, true)
                .map_err(ConfigError::Storage)?;
        }
        layout::save_template_aspects_to_cvs(&mut self.cvs, mast, signal_set_or_mast_type)
            .map_err(ConfigError::Storage)?;

        log::info!("Mast {}: type set to {:#04x}", mast, signal_set_or_mast_type);
        self.reload();
        Ok(())
    }

    /// Wire a mast light to a 1-based output (0 = unassign).
    ///
    /// An output already wired to any other light, of this mast or
    /// another one, is refused.
    pub fn set_light_output(&mut self, mast: usize, light: usize, output: u8) -> ConfigResult<S> {
        self.unlocked()?;
        if mast >= NUM_SIGNAL_MAST {
            return Err(ConfigError::InvalidMast(mast));
        }
        if light >= MAX_OUTPUTS_PER_MAST {
            return Err(ConfigError::InvalidLight(light));
        }
        if usize::from(output) > NUM_OUTPUTS {
            return Err(ConfigError::InvalidOutput(output));
        }
        if output != layout::ONA {
            for other in 0..NUM_SIGNAL_MAST {
                let outputs = MastSettings::read(&self.cvs, other).outputs;
                let taken = outputs
                    .iter()
                    .enumerate()
                    .any(|(slot, &n)| n == output && (other != mast || slot != light));
                if taken {
                    return Err(ConfigError::OutputInUse {
                        output,
                        mast: other,
                    });
                }
            }
        }

        self.cvs
            .write_cv(mast_record_cv(mast) + light as u16, output)
            .map_err(ConfigError::Storage)?;
        self.reload();
        Ok(())
    }

    /// Map a code of a catalog mast to an aspect.
    pub fn set_aspect_entry(&mut self, mast: usize, code: u8, aspect: u8) -> ConfigResult<S> {
        let data = self.active_mast(mast)?;
        if usize::from(code) >= MAX_ASPECTS {
            return Err(ConfigError::InvalidAspect(code));
        }
        if aspect >= data.signal_set().aspect_count() {
            return Err(ConfigError::InvalidAspect(aspect));
        }

        self.cvs
            .write_cv(aspect_table_cv(mast, usize::from(code)), aspect)
            .map_err(ConfigError::Storage)?;
        self.reload();
        Ok(())
    }

    /// Set the code (catalog masts) or aspect shown after power-up.
    pub fn set_default(&mut self, mast: usize, code_or_aspect: u8) -> ConfigResult<S> {
        let data = self.active_mast(mast)?;
        if !data.accepts_code(code_or_aspect) {
            return Err(ConfigError::InvalidAspect(code_or_aspect));
        }

        let mut settings = MastSettings::read(&self.cvs, mast);
        settings.default_code_or_aspect = code_or_aspect;
        settings
            .write(&mut self.cvs, mast)
            .map_err(ConfigError::Storage)?;
        self.reload();
        Ok(())
    }

    /// Replace the global configuration.
    ///
    /// Refused while locked; unlock with [`set_decoder_key`](Self::set_decoder_key).
    pub fn set_config(&mut self, config: DecoderConfig) -> ConfigResult<S> {
        self.unlocked()?;
        config.store(&mut self.cvs).map_err(ConfigError::Storage)?;
        self.reload();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{csd, MastType, SignalSet};
    use crate::hal::{MockOutputs, RamCvStore};
    use crate::light::LightSign;

    fn started() -> SignalDecoder<RamCvStore> {
        let mut decoder = SignalDecoder::new(RamCvStore::new());
        decoder.start().unwrap();
        decoder
    }

    // =========================================================================
    // Start Tests
    // =========================================================================

    #[test]
    fn blank_store_gets_factory_defaults() {
        let decoder = started();
        assert_eq!(decoder.mast_count(), 8);
        assert_eq!(decoder.address_map().mast_address(0), Some((100, 3)));
        assert_eq!(decoder.address_map().mast_address(7), Some((121, 3)));
        assert_eq!(decoder.mast_output(1, 0), Some(5));
    }

    #[test]
    fn start_keeps_existing_configuration() {
        let mut decoder = started();
        decoder
            .set_config(DecoderConfig::default().with_mast_count(2))
            .unwrap();

        let mut decoder = SignalDecoder::new(decoder.into_cv_store());
        decoder.start().unwrap();
        assert_eq!(decoder.mast_count(), 2);
        assert!(decoder.mast(2).is_none());
    }

    #[test]
    fn default_aspects_are_shown() {
        let decoder = started();
        // Incoming5 default code 0 = stop, red is the third light
        assert_eq!(decoder.mast(0).unwrap().current_aspect(), csd::STOP);
        assert!(decoder.is_output_lit(2));
        assert!(!decoder.is_output_lit(0));
        assert!(decoder.current_output_state(2).is_finished());
    }

    // =========================================================================
    // Command Tests
    // =========================================================================

    #[test]
    fn unknown_addresses_are_ignored() {
        let mut decoder = started();
        assert_eq!(decoder.on_address_command(99, 1, 0), None);
        assert_eq!(decoder.on_address_command(124, 1, 0), None);
    }

    #[test]
    fn bitwise_commands_build_one_code() {
        let mut decoder = started();
        decoder.on_address_command(103, 1, 0);
        let write = decoder.on_address_command(105, 1, 10);
        assert_eq!(write, Some(CodeWrite { mast: 1, code: 5 }));

        let report = decoder.tick(200);
        assert_eq!(
            report.settled.as_slice(),
            &[SettledAspect {
                mast: 1,
                code: 5,
                aspect: csd::SPEED_40_CAUTION
            }]
        );
    }

    #[test]
    fn roco_addresses_are_shifted() {
        let mut decoder = started();
        decoder
            .set_config(DecoderConfig::default().with_roco_addressing(true))
            .unwrap();
        assert_eq!(
            decoder.on_address_command(96, 1, 0),
            Some(CodeWrite { mast: 0, code: 1 })
        );
    }

    #[test]
    fn settled_code_out_of_range_is_discarded() {
        let mut decoder = started();
        // Departure4 knows 6 codes, its 3 bitwise addresses can form 8
        decoder
            .set_mast_type(0, USES_CODES | MastType::Departure4 as u8)
            .unwrap();
        assert_eq!(decoder.mast(0).unwrap().address_count(), 3);

        for address in 100..103 {
            decoder.on_address_command(address, 1, 0);
        }
        assert_eq!(decoder.mast_state(0).unwrap().pending, Some(7));

        assert!(decoder.tick(200).settled.is_empty());
        assert_eq!(decoder.mast(0).unwrap().current_aspect(), csd::STOP);
    }

    #[test]
    fn turnout_commands_outside_codes_are_ignored() {
        let mut decoder = started();
        decoder
            .set_mast_type(0, USES_CODES | ControlStyle::Turnout.bits() | MastType::Departure3 as u8)
            .unwrap();
        assert_eq!(decoder.mast(0).unwrap().address_count(), 2);
        assert_eq!(decoder.on_address_command(101, 1, 0), Some(CodeWrite { mast: 0, code: 3 }));
        decoder.tick(200);
        assert_eq!(decoder.mast(0).unwrap().current_aspect(), csd::EXPECT_40);
    }

    // =========================================================================
    // Tick Tests
    // =========================================================================

    #[test]
    fn tick_advances_blinking_lights() {
        let mut decoder = started();
        decoder.change_aspect(0, csd::EXPECT_40).unwrap();
        assert!(decoder.is_output_lit(1));

        let report = decoder.tick(600);
        assert!(report.settled.is_empty());
        assert_eq!(report.toggled, 1);
        assert!(!decoder.is_output_lit(1));
    }

    #[test]
    fn change_aspect_discards_pending_code() {
        let mut decoder = started();
        decoder.on_address_command(100, 1, 0);
        decoder.change_aspect(0, csd::CALL_ON).unwrap();

        assert!(decoder.tick(1000).settled.is_empty());
        let state = decoder.mast_state(0).unwrap();
        assert_eq!(state.aspect, csd::CALL_ON);
        assert_eq!(state.code, 7);
        assert_eq!(state.pending, None);
    }

    #[test]
    fn change_aspect_rejects_unknown_aspect() {
        let mut decoder = started();
        assert_eq!(
            decoder.change_aspect(0, 40),
            Err(ConfigError::InvalidAspect(40))
        );
        assert_eq!(
            decoder.change_aspect(12, csd::STOP),
            Err(ConfigError::InvalidMast(12))
        );
    }

    // =========================================================================
    // Output Tests
    // =========================================================================

    #[test]
    fn overrides_reach_the_driver() {
        let mut decoder = started();
        assert!(decoder.set_override(79, true));
        assert!(!decoder.set_override(80, true));

        let mut outputs = MockOutputs::new();
        decoder.drive(&mut outputs).unwrap();
        assert!(outputs.is_lit(79));
        assert!(outputs.is_lit(2));

        decoder.clear_overrides();
        decoder.drive(&mut outputs).unwrap();
        assert!(!outputs.is_lit(79));
        assert_eq!(outputs.frames.len(), 2);
    }

    #[test]
    fn disabled_mast_is_dark() {
        let mut decoder = started();
        decoder.set_mast_type(0, SignalSet::Disabled as u8).unwrap();
        for output in 0..5 {
            assert_eq!(decoder.current_output_state(output).sign(), LightSign::Inactive);
        }
    }

    // =========================================================================
    // Configuration Write Tests
    // =========================================================================

    #[test]
    fn light_output_conflicts_are_rejected() {
        let mut decoder = started();
        assert_eq!(
            decoder.set_light_output(0, 0, 6),
            Err(ConfigError::OutputInUse { output: 6, mast: 1 })
        );
        assert_eq!(decoder.set_light_output(0, 0, 81), Err(ConfigError::InvalidOutput(81)));
        assert_eq!(
            decoder.set_light_output(0, MAX_OUTPUTS_PER_MAST, 70),
            Err(ConfigError::InvalidLight(MAX_OUTPUTS_PER_MAST))
        );

        decoder.set_light_output(0, 0, 70).unwrap();
        assert_eq!(decoder.mast_output(0, 0), Some(69));
    }

    #[test]
    fn light_output_conflicts_within_mast_are_rejected() {
        let mut decoder = started();
        // Output 2 is the upper yellow of mast 0
        assert_eq!(
            decoder.set_light_output(0, 0, 2),
            Err(ConfigError::OutputInUse { output: 2, mast: 0 })
        );
        assert_eq!(decoder.mast_output(0, 0), Some(0));

        // Rewriting a slot with its own output is fine
        decoder.set_light_output(0, 1, 2).unwrap();
        assert_eq!(decoder.mast_output(0, 1), Some(1));
    }

    #[test]
    fn aliased_output_is_skipped_for_later_mast() {
        let mut cvs = RamCvStore::new();
        layout::write_factory_defaults(&mut cvs).unwrap();
        // Mast 1 red light onto mast 0 green light
        cvs.write_cv(mast_record_cv(1) + 2, 1).unwrap();

        let decoder = SignalDecoder::new(cvs);
        assert_eq!(decoder.mast_output(0, 0), Some(0));
        assert_eq!(decoder.mast_output(1, 2), None);
        // Mast 0 shows stop; the shared output stays dark
        assert!(!decoder.is_output_lit(0));
    }

    #[test]
    fn aspect_entry_changes_translation() {
        let mut decoder = started();
        decoder.set_aspect_entry(0, 1, csd::EXPECT_80).unwrap();
        assert_eq!(decoder.translate_code(0, 1), Some(csd::EXPECT_80));
        assert_eq!(decoder.translate_code(0, 8), None);
        assert_eq!(
            decoder.set_aspect_entry(0, 1, 16),
            Err(ConfigError::InvalidAspect(16))
        );
    }

    #[test]
    fn set_default_is_shown_after_reload() {
        let mut decoder = started();
        decoder.set_default(3, 1).unwrap();
        assert_eq!(decoder.mast(3).unwrap().current_aspect(), csd::CLEAR);
        assert_eq!(decoder.set_default(3, 8), Err(ConfigError::InvalidAspect(8)));
    }

    #[test]
    fn set_mast_type_validates_index() {
        let mut decoder = started();
        assert_eq!(
            decoder.set_mast_type(0, USES_CODES | 0x1e),
            Err(ConfigError::InvalidMastType(USES_CODES | 0x1e))
        );
        assert_eq!(
            decoder.set_mast_type(NUM_SIGNAL_MAST, 1),
            Err(ConfigError::InvalidMast(NUM_SIGNAL_MAST))
        );
    }

    #[test]
    fn locked_decoder_refuses_configuration_writes() {
        let mut decoder = started();
        decoder
            .set_config(DecoderConfig::default().with_decoder_lock(7))
            .unwrap();
        assert!(decoder.config().is_locked());
        let writes = decoder.cv_store().write_count;

        assert_eq!(decoder.set_default(0, 1), Err(ConfigError::Locked));
        assert_eq!(
            decoder.set_mast_type(0, SignalSet::Disabled as u8),
            Err(ConfigError::Locked)
        );
        assert_eq!(decoder.set_light_output(0, 0, 70), Err(ConfigError::Locked));
        assert_eq!(decoder.set_aspect_entry(0, 1, csd::CAUTION), Err(ConfigError::Locked));
        assert_eq!(
            decoder.set_config(DecoderConfig::default()),
            Err(ConfigError::Locked)
        );
        assert_eq!(decoder.cv_store().write_count, writes);

        // Runtime aspect changes are not configuration
        decoder.change_aspect(0, csd::CLEAR).unwrap();

        decoder.set_decoder_key(3).unwrap();
        assert_eq!(decoder.set_default(0, 1), Err(ConfigError::Locked));
        decoder.set_decoder_key(7).unwrap();
        decoder.set_default(0, 1).unwrap();
        assert_eq!(decoder.mast(0).unwrap().default_code(), 1);
    }

    #[test]
    fn factory_reset_unlocks() {
        let mut decoder = started();
        decoder
            .set_config(DecoderConfig::default().with_decoder_lock(7))
            .unwrap();
        decoder.factory_reset().unwrap();
        assert!(!decoder.config().is_locked());
    }

    #[test]
    fn drive_passes_fade_rate() {
        let mut decoder = started();
        let mut outputs = MockOutputs::new();
        decoder.drive(&mut outputs).unwrap();
        assert_eq!(outputs.fade_rate, Some(5));

        decoder
            .set_config(DecoderConfig::default().with_fade_rate(2))
            .unwrap();
        decoder.drive(&mut outputs).unwrap();
        assert_eq!(outputs.fade_rate, Some(2));
    }

    #[test]
    fn jmri_aspect_numbers() {
        let mut decoder = started();
        assert_eq!(decoder.aspect_jmri(0, csd::STOP), Some(0));
        assert_eq!(decoder.aspect_jmri(0, csd::EXPECT_40), Some(3));
        assert_eq!(decoder.aspect_jmri(0, csd::CALL_ON), Some(7));
        // Incoming5 has no code for shunting
        assert_eq!(decoder.aspect_jmri(0, csd::SHUNT_ALLOWED), None);
        assert_eq!(decoder.aspect_jmri(0, 40), None);
        assert_eq!(decoder.aspect_jmri(NUM_SIGNAL_MAST, csd::STOP), None);

        // First code wins when several show the aspect
        decoder.set_aspect_entry(0, 6, csd::CLEAR).unwrap();
        assert_eq!(decoder.aspect_jmri(0, csd::CLEAR), Some(1));

        decoder.set_mast_type(2, SignalSet::SzdcBasic as u8).unwrap();
        assert_eq!(decoder.aspect_jmri(2, csd::CALL_ON_SLOW), Some(csd::CALL_ON_SLOW));
    }

    #[test]
    fn set_mast_type_keeps_wiring() {
        let mut decoder = started();
        decoder
            .set_mast_type(1, USES_CODES | MastType::Shunting2 as u8)
            .unwrap();

        // Shunting2 carries red and white only; they keep outputs 8 and 9
        assert_eq!(decoder.mast_output(1, 0), None);
        assert_eq!(decoder.mast_output(1, 2), Some(7));
        assert_eq!(decoder.mast_output(1, 3), Some(8));
        assert_eq!(decoder.mast(1).unwrap().current_aspect(), csd::SHUNT_FORBIDDEN);
    }
}
