//! TLB-6700 command-set integration tests.
//!
//! Exercises every driver operation against the scripted mock transport.
//! The mock verifies the exact wire string for each command, so these
//! tests pin the vendor protocol down to the byte: mixed-case SCPI-style
//! headers exactly as the controller documents them, including the sense
//! commands issued without a trailing `?`.

use newport_tlb6700::types::{BeepMode, ControlMode, LockoutMode, Setpoint};
use newport_tlb6700::{Error, MockTransport, Tlb6700};

fn laser_over(mock: &MockTransport) -> Tlb6700 {
    Tlb6700::new(Box::new(mock.clone()))
}

#[tokio::test]
async fn test_identification() {
    let mock = MockTransport::connected();
    mock.expect("*IDN?", "New Focus 6700 Series TLB-6700 v2.4 SN10045");

    let mut laser = laser_over(&mock);
    let id = laser.identify().await.expect("identify failed");
    assert_eq!(id, "New Focus 6700 Series TLB-6700 v2.4 SN10045");
    assert_eq!(mock.call_log(), vec!["*IDN?".to_string()]);
}

#[tokio::test]
async fn test_common_commands() {
    let mock = MockTransport::connected();
    mock.expect("*RCL 1", "OK");
    mock.expect("*RST", "OK");
    mock.expect("*SAV 3", "OK");
    mock.expect("*OPC?", "1");
    mock.expect("*STB?", "128");

    let mut laser = laser_over(&mock);
    laser.recall_settings(1).await.expect("recall failed");
    laser.reset().await.expect("reset failed");
    laser.save_settings(3).await.expect("save failed");
    assert!(laser.operation_complete().await.expect("opc failed"));
    assert_eq!(laser.status_byte().await.expect("stb failed"), 128);
    assert_eq!(mock.remaining(), 0);
}

#[tokio::test]
async fn test_front_panel_commands() {
    let mock = MockTransport::connected();
    mock.expect("BEEP 0", "OK");
    mock.expect("BEEP 1", "OK");
    mock.expect("BEEP 2", "OK");
    mock.expect("BEEP?", "1");
    mock.expect("BRIGHT 75", "OK");
    mock.expect("BRIGHT?", "75");
    mock.expect("LOCKOUT 2", "OK");
    mock.expect("LOCKOUT?", "2");

    let mut laser = laser_over(&mock);
    laser.set_beep(BeepMode::Off).await.expect("beep off failed");
    laser.set_beep(BeepMode::On).await.expect("beep on failed");
    laser.set_beep(BeepMode::Test).await.expect("beep test failed");
    assert!(laser.beep().await.expect("beep query failed"));

    laser.set_brightness(75).await.expect("brightness failed");
    assert_eq!(laser.brightness().await.expect("brightness query failed"), 75);

    laser
        .set_lockout(LockoutMode::DialDisabled)
        .await
        .expect("lockout failed");
    assert_eq!(
        laser.lockout().await.expect("lockout query failed"),
        LockoutMode::DialDisabled
    );
    assert_eq!(mock.remaining(), 0);
}

#[tokio::test]
async fn test_error_buffer_drain() {
    let mock = MockTransport::connected();
    mock.expect("ERRSTR?", "116,\"Command Error\"");
    mock.expect("ERRSTR?", "501,\"Over Temperature\"");
    mock.expect("ERRSTR?", "0,\"NO ERROR\"");

    let mut laser = laser_over(&mock);

    let first = laser
        .next_error()
        .await
        .expect("errstr failed")
        .expect("buffer should hold an entry");
    assert_eq!(first.code, 116);
    assert_eq!(first.message, "Command Error");

    let second = laser
        .next_error()
        .await
        .expect("errstr failed")
        .expect("buffer should hold a second entry");
    assert_eq!(second.code, 501);

    // Code 0 marks the buffer empty.
    assert!(laser.next_error().await.expect("errstr failed").is_none());
    assert_eq!(mock.remaining(), 0);
}

#[tokio::test]
async fn test_error_string_is_raw() {
    let mock = MockTransport::connected();
    mock.expect("ERRSTR?", "0,\"NO ERROR\"");

    let mut laser = laser_over(&mock);
    let raw = laser.error_string().await.expect("errstr failed");
    assert_eq!(raw, "0,\"NO ERROR\"");
}

#[tokio::test]
async fn test_output_controls() {
    let mock = MockTransport::connected();
    mock.expect("ONDELAY 5000", "OK");
    mock.expect("ONDELAY?", "5000");
    mock.expect("OUTPut:STATe ON", "OK");
    mock.expect("OUTPut:STATe?", "1");
    mock.expect("OUTPut:STATe OFF", "OK");
    mock.expect("OUTPUT:TRACK 1", "OK");
    mock.expect("OUTPUT:TRACK?", "1");
    mock.expect("OUTPUT:TRACK 0", "OK");

    let mut laser = laser_over(&mock);
    laser.set_on_delay_ms(5000).await.expect("ondelay failed");
    assert_eq!(laser.on_delay_ms().await.expect("ondelay query failed"), 5000);

    laser.set_output(true).await.expect("output on failed");
    assert!(laser.output().await.expect("output query failed"));
    laser.set_output(false).await.expect("output off failed");

    laser.set_lambda_track(true).await.expect("track on failed");
    assert!(laser.lambda_track().await.expect("track query failed"));
    laser.set_lambda_track(false).await.expect("track off failed");
    assert_eq!(mock.remaining(), 0);
}

/// The measured-value commands for current, temperatures, and the
/// auxiliary input are issued without a trailing `?`.
#[tokio::test]
async fn test_sensed_values() {
    let mock = MockTransport::connected();
    mock.expect("SENSe:CURRent:DIODe", "142.73");
    mock.expect("SENSe:TEMPerature:DIODe", "24.981");
    mock.expect("SENSe:TEMPerature:CAVity", "25.303");
    mock.expect("SENSe:VOLTage:AUXiliary", "0.412");
    mock.expect("SENSE:POWER:DIODE?", "12.80");
    mock.expect("SENSE:WAVELENGTH?", "1549.998");

    let mut laser = laser_over(&mock);
    assert_eq!(laser.diode_current_ma().await.expect("current failed"), 142.73);
    assert_eq!(
        laser
            .diode_temperature_c()
            .await
            .expect("diode temperature failed"),
        24.981
    );
    assert_eq!(
        laser
            .cavity_temperature_c()
            .await
            .expect("cavity temperature failed"),
        25.303
    );
    assert_eq!(
        laser
            .auxiliary_voltage_v()
            .await
            .expect("aux voltage failed"),
        0.412
    );
    assert_eq!(laser.diode_power_mw().await.expect("power failed"), 12.80);
    assert_eq!(
        laser.wavelength_nm().await.expect("wavelength failed"),
        1549.998
    );
    assert_eq!(mock.remaining(), 0);
}

#[tokio::test]
async fn test_setpoint_commands() {
    let mock = MockTransport::connected();
    mock.expect("SOURce:CURRent:DIODe 145.5", "OK");
    mock.expect("SOURce:CURRent:DIODe?", "145.5");
    mock.expect("SOURCE:POWER:DIODE 13", "OK");
    mock.expect("SOURCE:POWER:DIODE?", "13.0");
    mock.expect("SOURCE:WAVELENGTH 1550", "OK");
    mock.expect("SOURCE:WAVELENGTH?", "1550.00");
    mock.expect("SOURce:VOLTage:PIEZo 45.5", "OK");
    mock.expect("SOURce:VOLTage:PIEZo?", "45.5");
    mock.expect("SOURce:TEMPerature:DIODe?", "25.000");
    mock.expect("SOURce:TEMPerature:CAVity?", "25.500");

    let mut laser = laser_over(&mock);
    laser.set_diode_current(145.5).await.expect("set current failed");
    assert_eq!(
        laser
            .diode_current_setpoint_ma()
            .await
            .expect("current setpoint failed"),
        145.5
    );

    laser.set_diode_power(13.0).await.expect("set power failed");
    assert_eq!(
        laser
            .diode_power_setpoint_mw()
            .await
            .expect("power setpoint failed"),
        13.0
    );

    laser
        .set_wavelength_nm(1550.0)
        .await
        .expect("set wavelength failed");
    assert_eq!(
        laser
            .wavelength_setpoint_nm()
            .await
            .expect("wavelength setpoint failed"),
        1550.0
    );

    laser.set_piezo_percent(45.5).await.expect("set piezo failed");
    assert_eq!(
        laser
            .piezo_setpoint_percent()
            .await
            .expect("piezo setpoint failed"),
        45.5
    );

    assert_eq!(
        laser
            .diode_temperature_setpoint_c()
            .await
            .expect("diode temperature setpoint failed"),
        25.0
    );
    assert_eq!(
        laser
            .cavity_temperature_setpoint_c()
            .await
            .expect("cavity temperature setpoint failed"),
        25.5
    );
    assert_eq!(mock.remaining(), 0);
}

/// Diode current, diode power, and piezo voltage accept the device
/// keyword `MAX` in place of a number.
#[tokio::test]
async fn test_max_keyword_setpoints() {
    let mock = MockTransport::connected();
    mock.expect("SOURce:CURRent:DIODe MAX", "OK");
    mock.expect("SOURCE:POWER:DIODE MAX", "OK");
    mock.expect("SOURce:VOLTage:PIEZo MAX", "OK");

    let mut laser = laser_over(&mock);
    laser
        .set_diode_current(Setpoint::Max)
        .await
        .expect("max current failed");
    laser
        .set_diode_power(Setpoint::Max)
        .await
        .expect("max power failed");
    laser
        .set_piezo_percent(Setpoint::Max)
        .await
        .expect("max piezo failed");
    assert_eq!(mock.remaining(), 0);
}

#[tokio::test]
async fn test_system_commands() {
    let mock = MockTransport::connected();
    mock.expect("SYSTem:ENTIME?", "50412");
    mock.expect("SYSTem:MCONtrol REM", "OK");
    mock.expect("SYSTem:MCONtrol?", "REM");
    mock.expect("SYSTem:MCONtrol LOC", "OK");

    let mut laser = laser_over(&mock);
    assert_eq!(
        laser.enable_time_min().await.expect("entime failed"),
        50412
    );
    laser
        .set_control_mode(ControlMode::Remote)
        .await
        .expect("remote failed");
    assert_eq!(
        laser.control_mode().await.expect("mcontrol query failed"),
        ControlMode::Remote
    );
    laser
        .set_control_mode(ControlMode::Local)
        .await
        .expect("local failed");
    assert_eq!(mock.remaining(), 0);
}

#[tokio::test]
async fn test_laser_head_identity() {
    let mock = MockTransport::connected();
    mock.expect("SYSTem:LASer:MODEL?", "TLB-6712-P");
    mock.expect("SYSTem:LASer:SN?", "SN10045");
    mock.expect("SYSTem:LASer:REV?", "2.4");
    mock.expect("SYSTem:LASer:CALDATE?", "06/17/2024");

    let mut laser = laser_over(&mock);
    let head = laser.laser_head().await.expect("laser head failed");
    assert_eq!(head.model, "TLB-6712-P");
    assert_eq!(head.serial, "SN10045");
    assert_eq!(head.revision, "2.4");
    assert_eq!(head.calibration_date, "06/17/2024");
    assert_eq!(mock.remaining(), 0);
}

/// A status snapshot is a fixed sequence of eleven queries; verify both
/// the values and the order on the wire.
#[tokio::test]
async fn test_status_snapshot() {
    let mock = MockTransport::connected();
    mock.expect("OUTPut:STATe?", "1");
    mock.expect("OUTPUT:TRACK?", "0");
    mock.expect("SOURCE:WAVELENGTH?", "1550.00");
    mock.expect("SENSE:WAVELENGTH?", "1549.998");
    mock.expect("SOURce:CURRent:DIODe?", "146.00");
    mock.expect("SENSe:CURRent:DIODe", "145.82");
    mock.expect("SOURCE:POWER:DIODE?", "13.0");
    mock.expect("SENSE:POWER:DIODE?", "12.80");
    mock.expect("SOURce:VOLTage:PIEZo?", "45.5");
    mock.expect("SENSe:TEMPerature:DIODe", "24.981");
    mock.expect("SENSe:TEMPerature:CAVity", "25.303");

    let mut laser = laser_over(&mock);
    let before = chrono::Utc::now();
    let status = laser.status().await.expect("status failed");
    let after = chrono::Utc::now();

    assert!(status.output_on);
    assert!(!status.lambda_track);
    assert_eq!(status.wavelength_setpoint_nm, 1550.0);
    assert_eq!(status.wavelength_nm, 1549.998);
    assert_eq!(status.diode_current_setpoint_ma, 146.0);
    assert_eq!(status.diode_current_ma, 145.82);
    assert_eq!(status.diode_power_setpoint_mw, 13.0);
    assert_eq!(status.diode_power_mw, 12.80);
    assert_eq!(status.piezo_setpoint_percent, 45.5);
    assert_eq!(status.diode_temperature_c, 24.981);
    assert_eq!(status.cavity_temperature_c, 25.303);
    assert!(status.timestamp >= before && status.timestamp <= after);

    assert_eq!(mock.remaining(), 0);
    assert_eq!(
        mock.call_log(),
        vec![
            "OUTPut:STATe?",
            "OUTPUT:TRACK?",
            "SOURCE:WAVELENGTH?",
            "SENSE:WAVELENGTH?",
            "SOURce:CURRent:DIODe?",
            "SENSe:CURRent:DIODe",
            "SOURCE:POWER:DIODE?",
            "SENSE:POWER:DIODE?",
            "SOURce:VOLTage:PIEZo?",
            "SENSe:TEMPerature:DIODe",
            "SENSe:TEMPerature:CAVity",
        ]
    );
}

#[tokio::test]
async fn test_status_snapshot_serializes_to_json() {
    let mock = MockTransport::connected();
    mock.expect("OUTPut:STATe?", "0");
    mock.expect("OUTPUT:TRACK?", "0");
    mock.expect("SOURCE:WAVELENGTH?", "1550.00");
    mock.expect("SENSE:WAVELENGTH?", "1549.998");
    mock.expect("SOURce:CURRent:DIODe?", "146.00");
    mock.expect("SENSe:CURRent:DIODe", "0.00");
    mock.expect("SOURCE:POWER:DIODE?", "13.0");
    mock.expect("SENSE:POWER:DIODE?", "0.00");
    mock.expect("SOURce:VOLTage:PIEZo?", "45.5");
    mock.expect("SENSe:TEMPerature:DIODe", "24.981");
    mock.expect("SENSe:TEMPerature:CAVity", "25.303");

    let mut laser = laser_over(&mock);
    let status = laser.status().await.expect("status failed");

    let value = serde_json::to_value(&status).expect("serialize failed");
    assert_eq!(value["output_on"], serde_json::json!(false));
    assert_eq!(value["wavelength_nm"], serde_json::json!(1549.998));
    assert!(value["timestamp"].is_string());
}

#[tokio::test]
async fn test_device_reported_fault_surfaces_as_error() {
    let mock = MockTransport::connected();
    mock.expect("SENSE:WAVELENGTH?", "ERROR 205");

    let mut laser = laser_over(&mock);
    let err = laser.wavelength_nm().await.unwrap_err();
    assert!(matches!(err, Error::Device(msg) if msg == "ERROR 205"));
}

#[tokio::test]
async fn test_unacknowledged_set_surfaces_as_rejection() {
    let mock = MockTransport::connected();
    mock.expect("SOURCE:WAVELENGTH 9999", "ERROR 201");

    let mut laser = laser_over(&mock);
    let err = laser.set_wavelength_nm(9999.0).await.unwrap_err();
    match err {
        Error::Rejected { command, reply } => {
            assert_eq!(command, "SOURCE:WAVELENGTH 9999");
            assert_eq!(reply, "ERROR 201");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unparseable_reply_names_the_quantity() {
    let mock = MockTransport::connected();
    mock.expect("SENSE:POWER:DIODE?", "not-a-number");

    let mut laser = laser_over(&mock);
    let err = laser.diode_power_mw().await.unwrap_err();
    assert!(matches!(err, Error::Parse { what: "diode power", .. }));
}

#[tokio::test]
async fn test_transport_failure_propagates() {
    let mock = MockTransport::connected();
    mock.expect("*IDN?", "unreached");
    mock.inject_next_failure();

    let mut laser = laser_over(&mock);
    assert!(matches!(laser.identify().await.unwrap_err(), Error::Io(_)));

    // One-shot: after the injected failure the exchange still works.
    let id = laser.identify().await.expect("second identify failed");
    assert_eq!(id, "unreached");
}

#[tokio::test]
async fn test_driver_over_disconnected_transport() {
    let mock = MockTransport::new();
    let mut laser = laser_over(&mock);
    assert!(!laser.is_connected());
    assert!(matches!(
        laser.identify().await.unwrap_err(),
        Error::NotConnected
    ));

    // Connecting through the driver brings the transport up.
    laser.connect().await.expect("connect failed");
    assert!(laser.is_connected());
    laser.close().await.expect("close failed");
    assert!(!laser.is_connected());
}
