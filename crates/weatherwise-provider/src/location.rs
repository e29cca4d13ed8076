//! Device location resolution.
//!
//! A [`DeviceLocator`] wraps any [`LocationSource`] with the single-shot
//! contract: a 5-second timeout and tolerance for platform results up to
//! 5 minutes old. On Linux the system source talks to GeoClue2 over D-Bus;
//! elsewhere the capability is reported as unavailable.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::LocationError;

/// Resolved device coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A platform facility that can produce the device's coordinates.
pub trait LocationSource {
    fn resolve(&self) -> impl Future<Output = Result<Coordinates, LocationError>> + Send;
}

/// Maximum age at which a previously resolved position is reused.
const MAX_RESULT_AGE: Duration = Duration::from_secs(5 * 60);

/// Single-shot locator over a platform source.
pub struct DeviceLocator<S> {
    source: S,
    timeout: Duration,
    last: Mutex<Option<(Coordinates, Instant)>>,
}

impl<S: LocationSource> DeviceLocator<S> {
    pub fn new(source: S, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            last: Mutex::new(None),
        }
    }

    /// Resolve the device coordinates.
    ///
    /// Serves the previous result if it is under 5 minutes old; otherwise
    /// asks the platform source, failing with [`LocationError::Timeout`]
    /// if it does not answer within the configured window.
    pub async fn locate(&self) -> Result<Coordinates, LocationError> {
        {
            let last = self.last.lock();
            if let Some((coords, at)) = *last {
                if at.elapsed() < MAX_RESULT_AGE {
                    tracing::debug!("Serving platform location from recent result");
                    return Ok(coords);
                }
            }
        }

        let coords = tokio::time::timeout(self.timeout, self.source.resolve())
            .await
            .map_err(|_| LocationError::Timeout)??;

        *self.last.lock() = Some((coords, Instant::now()));
        tracing::info!(
            latitude = coords.latitude,
            longitude = coords.longitude,
            "Resolved device location"
        );
        Ok(coords)
    }
}

/// The platform's own location service.
pub struct SystemLocationSource;

impl LocationSource for SystemLocationSource {
    async fn resolve(&self) -> Result<Coordinates, LocationError> {
        #[cfg(target_os = "linux")]
        {
            geoclue::resolve().await
        }
        #[cfg(not(target_os = "linux"))]
        {
            Err(LocationError::ServiceUnavailable)
        }
    }
}

#[cfg(target_os = "linux")]
mod geoclue {
    //! Minimal GeoClue2 client. Flow: obtain a client object from the
    //! manager, tag it with our desktop id, start it, then poll the client's
    //! Location property until the agent publishes a fix.

    use zbus::zvariant::OwnedObjectPath;

    use super::Coordinates;
    use crate::error::LocationError;

    #[zbus::proxy(
        interface = "org.freedesktop.GeoClue2.Manager",
        default_service = "org.freedesktop.GeoClue2",
        default_path = "/org/freedesktop/GeoClue2/Manager",
        gen_blocking = false
    )]
    trait Manager {
        fn get_client(&self) -> zbus::Result<OwnedObjectPath>;
    }

    #[zbus::proxy(
        interface = "org.freedesktop.GeoClue2.Client",
        default_service = "org.freedesktop.GeoClue2",
        gen_blocking = false
    )]
    trait Client {
        fn start(&self) -> zbus::Result<()>;
        fn stop(&self) -> zbus::Result<()>;

        #[zbus(property)]
        fn set_desktop_id(&self, id: &str) -> zbus::Result<()>;

        #[zbus(property)]
        fn location(&self) -> zbus::Result<OwnedObjectPath>;
    }

    #[zbus::proxy(
        interface = "org.freedesktop.GeoClue2.Location",
        default_service = "org.freedesktop.GeoClue2",
        gen_blocking = false
    )]
    trait Location {
        #[zbus(property)]
        fn latitude(&self) -> zbus::Result<f64>;

        #[zbus(property)]
        fn longitude(&self) -> zbus::Result<f64>;
    }

    const DESKTOP_ID: &str = "weatherwise";
    const POLL_INTERVAL_MS: u64 = 100;
    const MAX_POLLS: u32 = 50;

    fn map_err(e: zbus::Error) -> LocationError {
        let msg = e.to_string();
        if msg.contains("AccessDenied") {
            LocationError::PermissionDenied
        } else if msg.contains("ServiceUnknown") || msg.contains("NameHasNoOwner") {
            LocationError::ServiceUnavailable
        } else {
            LocationError::Other(msg)
        }
    }

    pub(super) async fn resolve() -> Result<Coordinates, LocationError> {
        let conn = zbus::Connection::system().await.map_err(map_err)?;

        let manager = ManagerProxy::new(&conn).await.map_err(map_err)?;
        let client_path = manager.get_client().await.map_err(map_err)?;

        let client = ClientProxy::builder(&conn)
            .path(client_path)
            .map_err(map_err)?
            .build()
            .await
            .map_err(map_err)?;

        client.set_desktop_id(DESKTOP_ID).await.map_err(map_err)?;
        client.start().await.map_err(map_err)?;

        // The Location property stays at "/" until the service has a fix.
        let mut fix = None;
        for _ in 0..MAX_POLLS {
            let path = client.location().await.map_err(map_err)?;
            if path.as_str() != "/" {
                fix = Some(path);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
        }

        let result = match fix {
            Some(path) => {
                let location = LocationProxy::builder(&conn)
                    .path(path)
                    .map_err(map_err)?
                    .build()
                    .await
                    .map_err(map_err)?;

                Ok(Coordinates {
                    latitude: location.latitude().await.map_err(map_err)?,
                    longitude: location.longitude().await.map_err(map_err)?,
                })
            }
            None => Err(LocationError::Timeout),
        };

        if let Err(e) = client.stop().await {
            tracing::debug!("Failed to stop GeoClue client: {}", e);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedSource {
        coords: Coordinates,
        calls: AtomicU32,
    }

    impl FixedSource {
        fn new(latitude: f64, longitude: f64) -> Self {
            Self {
                coords: Coordinates { latitude, longitude },
                calls: AtomicU32::new(0),
            }
        }
    }

    impl LocationSource for &FixedSource {
        async fn resolve(&self) -> Result<Coordinates, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.coords)
        }
    }

    struct SlowSource;

    impl LocationSource for SlowSource {
        async fn resolve(&self) -> Result<Coordinates, LocationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Coordinates { latitude: 0.0, longitude: 0.0 })
        }
    }

    struct DeniedSource;

    impl LocationSource for DeniedSource {
        async fn resolve(&self) -> Result<Coordinates, LocationError> {
            Err(LocationError::PermissionDenied)
        }
    }

    #[tokio::test]
    async fn test_locate_resolves_coordinates() {
        let source = FixedSource::new(47.6062, -122.3321);
        let locator = DeviceLocator::new(&source, Duration::from_secs(5));

        let coords = locator.locate().await.unwrap();
        assert!((coords.latitude - 47.6062).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_recent_result_is_reused() {
        let source = FixedSource::new(47.6062, -122.3321);
        let locator = DeviceLocator::new(&source, Duration::from_secs(5));

        locator.locate().await.unwrap();
        locator.locate().await.unwrap();

        // Second call served from the recent result, not the platform
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let locator = DeviceLocator::new(SlowSource, Duration::from_millis(50));
        let err = locator.locate().await.unwrap_err();
        assert!(matches!(err, LocationError::Timeout));
    }

    #[tokio::test]
    async fn test_permission_denied_propagates() {
        let locator = DeviceLocator::new(DeniedSource, Duration::from_secs(5));
        let err = locator.locate().await.unwrap_err();
        assert!(matches!(err, LocationError::PermissionDenied));
    }
}
