use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::cache::{CacheEntry, CacheStats, ScopeKey, SignalCache};
use crate::config::EngineConfig;
use crate::data::axis::{self, AxisModel};
use crate::data::loader::{SignalLoader, SignalSource};
use crate::data::model::{MetadataValue, Signal};
use crate::data::reader::InterchangeReader;
use crate::data::select::{self, SignalSummary};
use crate::error::{EngineError, Result};
use crate::extract::{image, peak, spectrum};
use crate::extract::{ImageResult, PeakMetrics, Region, SpectrumResult};
use crate::files::FileResolver;
use crate::lines::{self, EmissionLines};
use crate::protocol::{AxisInfo, Request, Response};

// ---------------------------------------------------------------------------
// SignalService – request-shaped operations over the cache
// ---------------------------------------------------------------------------

/// Entry point for the transport layer. Resolves file identifiers, goes
/// through the cache and hands the selected signal to an extractor.
pub struct SignalService<S: SignalSource = SignalLoader> {
    resolver: FileResolver,
    cache: SignalCache<S>,
}

impl SignalService<SignalLoader> {
    /// Interchange reader, hint order and cache size taken from `config`.
    pub fn from_config(config: EngineConfig) -> Self {
        let loader = SignalLoader::new(Arc::new(InterchangeReader), config.loader.hints.clone());
        let cache = SignalCache::new(loader, config.cache.effective_max_scopes());
        Self::new(FileResolver::new(config), cache)
    }
}

impl<S: SignalSource> SignalService<S> {
    pub fn new(resolver: FileResolver, cache: SignalCache<S>) -> Self {
        Self { resolver, cache }
    }

    pub fn cache(&self) -> &SignalCache<S> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        self.resolver.config()
    }

    // -- file level --

    pub fn list_files(&self, user: Option<&str>) -> Result<Vec<String>> {
        let scope = self.resolver.scope(user)?;
        self.resolver.list_files(&scope)
    }

    pub fn list_signals(&self, file: &str, user: Option<&str>) -> Result<Vec<SignalSummary>> {
        let entry = self.entry(file, user)?;
        Ok(select::summarize(&entry.signals))
    }

    /// First signal titled like `HAADF`, which must be a 2D image.
    pub fn haadf_image(&self, file: &str, user: Option<&str>) -> Result<Option<ImageResult>> {
        let entry = self.entry(file, user)?;
        let Some(index) = select::find_by_title(&entry.signals, "HAADF") else {
            debug!("No HAADF signal in {file}");
            return Ok(None);
        };

        let signal = &entry.signals[index];
        if signal.ndim() != 2 {
            return Err(EngineError::shape("HAADF image", "a 2D signal", signal.shape()));
        }
        image::extract(signal).map(Some)
    }

    // -- signal level --

    /// Whole-frame spectrum with zero-peak and FWHM markers.
    pub fn spectrum(&self, file: &str, index: usize, user: Option<&str>) -> Result<SpectrumResult> {
        let signal = self.signal(file, index, user)?;
        let y = spectrum::extract_whole(&signal)?;
        let metrics = match signal.spectral_axis() {
            Some(spectral) => peak::analyze(&y, &axis::calibrated(spectral)?)?,
            None => PeakMetrics::undefined(),
        };
        Ok(SpectrumResult::calibrated(&signal, y)?
            .with_markers(metrics.zero_index, metrics.fwhm_index))
    }

    pub fn region_spectrum(
        &self,
        file: &str,
        index: usize,
        region: &Region,
        user: Option<&str>,
    ) -> Result<SpectrumResult> {
        let signal = self.signal(file, index, user)?;
        let y = spectrum::extract_region(&signal, region)?;
        SpectrumResult::calibrated(&signal, y)
    }

    pub fn image(&self, file: &str, index: usize, user: Option<&str>) -> Result<ImageResult> {
        let signal = self.signal(file, index, user)?;
        image::extract(&signal)
    }

    /// Un-normalized sum over channels `start..=end`.
    pub fn energy_range_image(
        &self,
        file: &str,
        index: usize,
        start: usize,
        end: usize,
        user: Option<&str>,
    ) -> Result<Vec<Vec<f64>>> {
        let signal = self.signal(file, index, user)?;
        image::channel_range_image(&signal, start, end)
    }

    pub fn energy_window_sum(
        &self,
        file: &str,
        index: usize,
        start: f64,
        end: f64,
        user: Option<&str>,
    ) -> Result<f64> {
        let signal = self.signal(file, index, user)?;
        spectrum::energy_window_sum(&signal, start, end)
    }

    pub fn metadata(
        &self,
        file: &str,
        index: usize,
        user: Option<&str>,
    ) -> Result<BTreeMap<String, MetadataValue>> {
        Ok(self.signal(file, index, user)?.metadata.clone())
    }

    /// Spectral axis of a 3D signal.
    pub fn axes(&self, file: &str, index: usize, user: Option<&str>) -> Result<AxisInfo> {
        let signal = self.signal(file, index, user)?;
        if signal.ndim() != 3 {
            return Err(EngineError::shape("axes", "a 3D signal", signal.shape()));
        }
        let Some(spectral) = signal.spectral_axis() else {
            return Err(EngineError::shape("axes", "a 3D signal", signal.shape()));
        };

        Ok(AxisInfo {
            name: spectral.name.clone(),
            size: spectral.size,
            offset: spectral.offset,
            scale: spectral.scale,
            units: spectral.units.clone(),
            zero_index: AxisModel::from(spectral).zero_index()?,
        })
    }

    pub fn zero_peak_width(&self, file: &str, index: usize, user: Option<&str>) -> Result<PeakMetrics> {
        let signal = self.signal(file, index, user)?;
        peak::analyze_signal(&signal)
    }

    /// Characteristic line energies (keV) of element `atomic_number`.
    pub fn emission_lines(&self, atomic_number: u32) -> Result<EmissionLines> {
        lines::emission_lines(atomic_number)
    }

    // -- sessions --

    /// Drop a user's cached file. Returns whether anything was cached.
    pub fn end_session(&self, user: &str) -> Result<bool> {
        let scope = self.resolver.scope(Some(user))?;
        Ok(self.cache.evict(&scope))
    }

    /// Drop sessions older than the configured timeout.
    pub fn expire_sessions(&self) -> usize {
        let removed = self
            .cache
            .evict_expired(self.config().cache.session_timeout());
        if removed > 0 {
            info!("Expired {removed} idle sessions");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // -- dispatch --

    /// Run one request. Failures come back as [`Response::Error`].
    pub fn handle(&self, request: Request) -> Response {
        match self.dispatch(request) {
            Ok(response) => response,
            Err(err) => {
                warn!("Request failed: {err}");
                Response::Error(err.to_payload())
            }
        }
    }

    fn dispatch(&self, request: Request) -> Result<Response> {
        Ok(match request {
            Request::ListFiles { user } => Response::Files(self.list_files(user.as_deref())?),
            Request::ListSignals { file, user } => {
                Response::Signals(self.list_signals(&file, user.as_deref())?)
            }
            Request::Spectrum { file, signal, user } => {
                Response::Spectrum(self.spectrum(&file, signal, user.as_deref())?)
            }
            Request::RegionSpectrum {
                file,
                signal,
                region,
                user,
            } => Response::Spectrum(self.region_spectrum(&file, signal, &region, user.as_deref())?),
            Request::Image { file, signal, user } => {
                Response::Image(self.image(&file, signal, user.as_deref())?)
            }
            Request::HaadfImage { file, user } => {
                Response::Haadf(self.haadf_image(&file, user.as_deref())?)
            }
            Request::EnergyRangeImage {
                file,
                signal,
                start,
                end,
                user,
            } => Response::EnergyImage(self.energy_range_image(
                &file,
                signal,
                start,
                end,
                user.as_deref(),
            )?),
            Request::EnergyWindowSum {
                file,
                signal,
                start,
                end,
                user,
            } => Response::Counts(self.energy_window_sum(&file, signal, start, end, user.as_deref())?),
            Request::Metadata { file, signal, user } => {
                Response::Metadata(self.metadata(&file, signal, user.as_deref())?)
            }
            Request::Axes { file, signal, user } => {
                Response::Axes(self.axes(&file, signal, user.as_deref())?)
            }
            Request::ZeroPeakWidth { file, signal, user } => {
                Response::ZeroPeak(self.zero_peak_width(&file, signal, user.as_deref())?)
            }
            Request::EmissionLines { atomic_number } => {
                Response::EmissionLines(self.emission_lines(atomic_number)?)
            }
            Request::CacheStats => Response::Stats(self.stats()),
            Request::EndSession { user } => Response::SessionEnded(self.end_session(&user)?),
            Request::ClearCache => {
                self.cache.clear();
                Response::Cleared
            }
        })
    }

    // -- helpers --

    fn locate(&self, file: &str, user: Option<&str>) -> Result<(ScopeKey, PathBuf)> {
        let scope = self.resolver.scope(user)?;
        let path = self.resolver.resolve(&scope, file)?;
        Ok((scope, path))
    }

    fn entry(&self, file: &str, user: Option<&str>) -> Result<Arc<CacheEntry>> {
        let (scope, path) = self.locate(file, user)?;
        Ok(self.cache.get_or_load(&scope, &path)?.entry)
    }

    fn signal(&self, file: &str, index: usize, user: Option<&str>) -> Result<Arc<Signal>> {
        let (scope, path) = self.locate(file, user)?;
        self.cache.get_signal(&scope, &path, index)
    }
}
