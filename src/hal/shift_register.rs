//! Output driver for chained 74HC595 shift registers.
//!
//! Ten registers hold the 80 outputs. The frame is shifted out last output
//! first, so output 0 ends up on Q0 of the register nearest the MCU.

use embedded_hal::digital::{OutputPin, PinState};

use crate::layout::NUM_OUTPUTS;
use crate::light::OutputFrame;
use crate::traits::OutputDriver;

/// 74HC595 chain driven by three GPIO pins.
///
/// The registers switch outputs hard; the fade rate is ignored.
///
/// # Example
///
/// ```rust,ignore
/// use rs_signals::hal::ShiftRegisterOutputs;
///
/// let mut outputs = ShiftRegisterOutputs::new(data_pin, clock_pin, latch_pin);
/// decoder.drive(&mut outputs)?;
/// ```
pub struct ShiftRegisterOutputs<D, C, L> {
    data: D,
    clock: C,
    latch: L,
}

impl<D, C, L, E> ShiftRegisterOutputs<D, C, L>
where
    D: OutputPin<Error = E>,
    C: OutputPin<Error = E>,
    L: OutputPin<Error = E>,
{
    /// Wrap the serial data, shift clock and storage latch pins.
    pub fn new(data: D, clock: C, latch: L) -> Self {
        Self { data, clock, latch }
    }

    /// Return the pins.
    pub fn release(self) -> (D, C, L) {
        (self.data, self.clock, self.latch)
    }
}

impl<D, C, L, E> OutputDriver for ShiftRegisterOutputs<D, C, L>
where
    D: OutputPin<Error = E>,
    C: OutputPin<Error = E>,
    L: OutputPin<Error = E>,
{
    type Error = E;

    fn write_outputs(&mut self, frame: &OutputFrame) -> Result<(), E> {
        self.latch.set_low()?;
        for output in (0..NUM_OUTPUTS).rev() {
            let lit = frame[output / 8] & (1 << (output % 8)) != 0;
            self.data.set_state(PinState::from(lit))?;
            self.clock.set_high()?;
            self.clock.set_low()?;
        }
        self.latch.set_high()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Pin {
        Data,
        Clock,
        Latch,
    }

    type Trace = Rc<RefCell<Vec<(Pin, bool)>>>;

    struct TracePin {
        pin: Pin,
        trace: Trace,
    }

    impl ErrorType for TracePin {
        type Error = Infallible;
    }

    impl OutputPin for TracePin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.trace.borrow_mut().push((self.pin, false));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.trace.borrow_mut().push((self.pin, true));
            Ok(())
        }
    }

    #[test]
    fn frame_is_shifted_last_output_first() {
        let trace = Trace::default();
        let pin = |pin| TracePin {
            pin,
            trace: trace.clone(),
        };
        let mut outputs = ShiftRegisterOutputs::new(pin(Pin::Data), pin(Pin::Clock), pin(Pin::Latch));

        let mut frame = [0; 10];
        frame[0] = 0b1;
        frame[9] = 0b1000_0000;
        outputs.write_outputs(&frame).unwrap();

        let trace = trace.borrow();
        let bits: Vec<bool> = trace
            .iter()
            .filter(|(pin, _)| *pin == Pin::Data)
            .map(|(_, high)| *high)
            .collect();
        assert_eq!(bits.len(), NUM_OUTPUTS);
        assert!(bits[0]);
        assert!(bits[NUM_OUTPUTS - 1]);
        assert_eq!(bits.iter().filter(|&&high| high).count(), 2);

        assert_eq!(trace.first(), Some(&(Pin::Latch, false)));
        assert_eq!(trace.last(), Some(&(Pin::Latch, true)));
        let clocks = trace.iter().filter(|(pin, high)| *pin == Pin::Clock && *high).count();
        assert_eq!(clocks, NUM_OUTPUTS);
    }
}
