//! libusb implementation of [`UsbBackend`] using the `rusb` crate.

use std::time::Duration;

use rusb::{DeviceHandle, Direction, GlobalContext};
use tracing::debug;

use super::{Endpoints, UsbBackend, UsbError};

/// A [`UsbBackend`] over the global libusb context.
#[derive(Default)]
pub struct RusbBackend {
    handle: Option<DeviceHandle<GlobalContext>>,
}

impl RusbBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self) -> Result<&DeviceHandle<GlobalContext>, UsbError> {
        self.handle.as_ref().ok_or(UsbError::NotOpen)
    }

    fn handle_mut(&mut self) -> Result<&mut DeviceHandle<GlobalContext>, UsbError> {
        self.handle.as_mut().ok_or(UsbError::NotOpen)
    }
}

impl UsbBackend for RusbBackend {
    fn open(&mut self, vendor_id: u16, product_id: u16) -> Result<(), UsbError> {
        let handle = rusb::open_device_with_vid_pid(vendor_id, product_id).ok_or(
            UsbError::NotFound {
                vendor_id,
                product_id,
            },
        )?;
        debug!(
            bus = handle.device().bus_number(),
            address = handle.device().address(),
            "opened usb device"
        );
        self.handle = Some(handle);
        Ok(())
    }

    fn endpoints(&self, interface: u8) -> Result<Endpoints, UsbError> {
        let config = self
            .handle()?
            .device()
            .active_config_descriptor()
            .map_err(map_rusb_error)?;

        let mut ep_in = None;
        let mut ep_out = None;
        let setting = config
            .interfaces()
            .filter(|i| i.number() == interface)
            .flat_map(|i| i.descriptors())
            .find(|d| d.setting_number() == 0);
        if let Some(setting) = setting {
            for ep in setting.endpoint_descriptors() {
                let slot = match ep.direction() {
                    Direction::In => &mut ep_in,
                    Direction::Out => &mut ep_out,
                };
                if slot.is_none() {
                    *slot = Some((ep.address(), ep.max_packet_size() as usize));
                }
            }
        }

        let (in_addr, in_size) = ep_in.ok_or(UsbError::MissingEndpoint {
            interface,
            direction: "IN",
        })?;
        let (out_addr, out_size) = ep_out.ok_or(UsbError::MissingEndpoint {
            interface,
            direction: "OUT",
        })?;
        Ok(Endpoints {
            ep_in: in_addr,
            ep_out: out_addr,
            in_max_packet_size: in_size,
            out_max_packet_size: out_size,
        })
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        self.handle_mut()?
            .claim_interface(interface)
            .map_err(map_rusb_error)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbError> {
        self.handle_mut()?
            .detach_kernel_driver(interface)
            .map_err(map_rusb_error)
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        self.handle_mut()?
            .release_interface(interface)
            .map_err(map_rusb_error)
    }

    fn write_bulk(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize, UsbError> {
        self.handle()?
            .write_bulk(endpoint, data, timeout)
            .map_err(map_rusb_error)
    }

    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize, UsbError> {
        self.handle()?
            .read_bulk(endpoint, buf, timeout)
            .map_err(map_rusb_error)
    }

    fn close(&mut self) {
        // Dropping the handle closes it.
        self.handle = None;
    }
}

fn map_rusb_error(e: rusb::Error) -> UsbError {
    match e {
        rusb::Error::Timeout => UsbError::Timeout,
        rusb::Error::Busy => UsbError::Busy,
        rusb::Error::Access => UsbError::Access,
        other => UsbError::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unopened_backend_reports_not_open() {
        let mut backend = RusbBackend::new();
        assert_eq!(backend.endpoints(1), Err(UsbError::NotOpen));
        assert_eq!(backend.claim_interface(1), Err(UsbError::NotOpen));
        assert_eq!(
            backend.write_bulk(0x03, &[0], Duration::from_millis(1)),
            Err(UsbError::NotOpen)
        );
        backend.close();
    }

    #[test]
    fn test_rusb_errors_map_to_transport_errors() {
        assert_eq!(map_rusb_error(rusb::Error::Timeout), UsbError::Timeout);
        assert_eq!(map_rusb_error(rusb::Error::Busy), UsbError::Busy);
        assert_eq!(map_rusb_error(rusb::Error::Access), UsbError::Access);
        assert!(matches!(
            map_rusb_error(rusb::Error::Pipe),
            UsbError::Other(_)
        ));
    }
}
