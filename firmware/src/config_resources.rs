// Provide a mapping for the controller GPIO pins

//
//| GPIO # | Name        | Description                                                    |
//| ------ | ----------- | -------------------------------------------------------------- |
//| 0      | RGBLED      | Data output for the five SK6805 (WS2812 style) RGB LEDs.       |
//| 2      | PWR_BTN_IN  | Input from the physical power button. Active low.              |
//| 3      | USER_BTN    | Input from the user-defined button. Active low.                |
//| 4      | PCIESLEEP   | Pull high to put the PCIe device to sleep.                     |
//| 5      | CHG_PRESENT | Charger input present, from the charger IC. Active low.        |
//| 17     | PWR_HOLD    | Keeps the controller supply latched on. Active high.           |
//| 19     | VEN         | Voltage Enable output for the 5V buck converter. Active high.  |
//| 20     | I2Cm_SDA    | I2Cm data line. Controller is primary, fuel gauge on the bus.  |
//| 21     | I2Cm_SCL    | I2Cm clock line. Controller is primary, fuel gauge on the bus. |
//| 22     | DIS_USB3    | USB3 disable signal. Active high.                              |
//| 23     | DIS_USB2    | USB2 disable signal. Active high.                              |
//| 24     | DIS_USB1    | USB1 disable signal. Active high.                              |
//| 25     | DIS_USB0    | USB0 disable signal. Active high.                              |

use assign_resources::assign_resources;
use embassy_rp::peripherals;

assign_resources! {
  /// GPIO pins for the controller
  rgb_led: RGBLEDResources {
    dma_ch: DMA_CH0,
    pin: PIN_0,
    pio: PIO0,
  },
  fuel_gauge: FuelGaugeResources {
    sda: PIN_20,
    scl: PIN_21,
    i2c: I2C0,
    charger_present: PIN_5,
  },
  power_key: PowerKeyResources {
    pin: PIN_2,
  },
  user_button: UserButtonResources {
    pin: PIN_3,
  },
  host_outputs: HostOutputResources {
    pcie_sleep: PIN_4,
    ven: PIN_19,
    dis_usb3: PIN_22,
    dis_usb2: PIN_23,
    dis_usb1: PIN_24,
    dis_usb0: PIN_25,
  },
  power_hold: PowerHoldResources {
    pin: PIN_17,
  },
}
