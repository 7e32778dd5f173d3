//! TB6612FNG dual H-bridge
//!
//! Each channel has a PWM input and an IN1/IN2 direction pair; both channels
//! share one STBY line that must be high for the outputs to drive.
//!
//! | IN1 | IN2 | Output  |
//! |-----|-----|---------|
//! |  H  |  L  | Forward |
//! |  L  |  H  | Reverse |
//! |  L  |  L  | Coast   |
//!
//! IN1 = IN2 = H is short brake and is never driven. Every direction change
//! lowers the opposite pin before raising the new one.

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

use tread_core::traits::{ActuatorFault, Direction, EnableLine, MotorChannel};

/// Convert a [0, 1] duty to PWM counts, rounding to nearest
fn duty_counts(duty: f32, max: u16) -> u16 {
    let duty = if duty.is_nan() {
        0.0
    } else {
        duty.clamp(0.0, 1.0)
    };
    (duty * max as f32 + 0.5) as u16
}

/// One TB6612 channel (A or B)
pub struct Tb6612Channel<PWM, IN1, IN2> {
    pwm: PWM,
    in1: IN1,
    in2: IN2,
}

impl<PWM, IN1, IN2> Tb6612Channel<PWM, IN1, IN2>
where
    PWM: SetDutyCycle,
    IN1: OutputPin,
    IN2: OutputPin,
{
    pub fn new(pwm: PWM, in1: IN1, in2: IN2) -> Self {
        Self { pwm, in1, in2 }
    }

    /// Release the pins
    pub fn release(self) -> (PWM, IN1, IN2) {
        (self.pwm, self.in1, self.in2)
    }
}

impl<PWM, IN1, IN2> MotorChannel for Tb6612Channel<PWM, IN1, IN2>
where
    PWM: SetDutyCycle,
    IN1: OutputPin,
    IN2: OutputPin,
{
    fn set_magnitude(&mut self, duty: f32) -> Result<(), ActuatorFault> {
        let counts = duty_counts(duty, self.pwm.max_duty_cycle());
        self.pwm
            .set_duty_cycle(counts)
            .map_err(|_| ActuatorFault::Pwm)
    }

    fn set_direction(&mut self, dir: Direction) -> Result<(), ActuatorFault> {
        let (in1, in2) = match dir {
            Direction::Forward => (true, false),
            Direction::Reverse => (false, true),
            Direction::Coast => (false, false),
        };

        // Lower before raising so IN1 and IN2 are never high together
        if !in1 {
            write_pin(&mut self.in1, false)?;
        }
        if !in2 {
            write_pin(&mut self.in2, false)?;
        }
        if in1 {
            write_pin(&mut self.in1, true)?;
        }
        if in2 {
            write_pin(&mut self.in2, true)?;
        }
        Ok(())
    }
}

fn write_pin<P: OutputPin>(pin: &mut P, high: bool) -> Result<(), ActuatorFault> {
    let result = if high { pin.set_high() } else { pin.set_low() };
    result.map_err(|_| ActuatorFault::DirectionPin)
}

/// Shared STBY line (high = outputs enabled)
pub struct StandbyPin<P> {
    pin: P,
}

impl<P: OutputPin> StandbyPin<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: OutputPin> EnableLine for StandbyPin<P> {
    fn set_enabled(&mut self, on: bool) -> Result<(), ActuatorFault> {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        result.map_err(|_| ActuatorFault::StandbyPin)
    }
}
