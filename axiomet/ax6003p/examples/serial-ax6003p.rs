use std::time::Duration;

use measurements::{Current, Voltage};
use scpirs::Calibrations;

use axiomet_ax6003p::{Ax6003p, SerialInterfaceAx6003p};

fn main() {
    // Run with `RUST_LOG=debug` to see the commands that are sent.
    env_logger::init();

    // Open the serial port the power supply is connected to.
    let interface = SerialInterfaceAx6003p::simple("/dev/ttyUSB0").expect("Instrument must be available.");
    let mut inst = Ax6003p::try_new(interface).unwrap();

    // query and print the name of the instrument
    println!("Instrument name: {}", inst.get_name().unwrap());

    // Set 5 V at a current limit of 0.5 A and turn the output on
    let (volts, amps) = inst
        .set_apply(Voltage::from_volts(5.0), Current::from_amperes(0.5))
        .unwrap();
    println!("Applied: {volts}, {amps}");
    inst.set_output(true).unwrap();

    // Give the output some time to settle, then measure
    std::thread::sleep(Duration::from_secs(1));
    let raw = inst.measure_voltage().unwrap();
    println!("Measured voltage: {raw}");
    println!("Measured current: {}", inst.measure_current().unwrap());
    println!("Measured power: {}", inst.measure_power().unwrap());

    // Post-process the measured voltage with a calibration polynomial
    let cal = Calibrations::load_or_default("cal_data.json").unwrap();
    println!("Calibrations: {cal}");
    println!(
        "Calibrated voltage: {} V",
        cal.evaluate("equ", raw.as_volts()).unwrap()
    );

    // Turn the output off again
    println!("Output on: {}", inst.set_output(false).unwrap());
}
