//! Hub'Eau endpoint definitions and first-page URL construction.
//!
//! Only the first page URL is built here; later pages come from the
//! service's `next` pointer verbatim.

use reqwest::Url;
use water_norms_series_models::SeriesKind;

use crate::{SeriesRequest, SourceError};

/// Public Hub'Eau API root.
pub const DEFAULT_BASE_URL: &str = "https://hubeau.eaufrance.fr/api/v1";

/// Query parameter carrying the page size. The service caps it at 20 000.
pub const PAGE_SIZE_PARAM: &str = "size";

/// Daily mean discharge, the elaborated quantity fetched for discharge
/// sites.
pub const DAILY_MEAN_DISCHARGE: &str = "QmJ";

/// Static description of one Hub'Eau series endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// Path below the API root.
    pub path: &'static str,
    /// Parameter holding the station identifier.
    pub id_param: &'static str,
    /// Parameter holding the inclusive start date.
    pub start_param: &'static str,
    /// Parameter holding the inclusive end date.
    pub end_param: &'static str,
    /// Fixed parameters appended after the date bounds.
    pub fixed_params: &'static [(&'static str, &'static str)],
}

/// The endpoint serving `kind`.
#[must_use]
pub const fn endpoint(kind: SeriesKind) -> Endpoint {
    match kind {
        SeriesKind::Discharge => Endpoint {
            path: "hydrometrie/obs_elab",
            id_param: "code_entite",
            start_param: "date_debut_obs_elab",
            end_param: "date_fin_obs_elab",
            fixed_params: &[("grandeur_hydro_elab", DAILY_MEAN_DISCHARGE)],
        },
        SeriesKind::GroundwaterLevel => Endpoint {
            path: "niveaux_nappes/chroniques",
            id_param: "code_bss",
            start_param: "date_debut_mesure",
            end_param: "date_fin_mesure",
            fixed_params: &[],
        },
    }
}

/// Builds the URL of the first page for `request`.
///
/// # Errors
///
/// Returns [`SourceError::Url`] if `base_url` is not a valid absolute URL.
pub fn first_page_url(
    base_url: &str,
    request: &SeriesRequest,
    page_size: u32,
) -> Result<String, SourceError> {
    let endpoint = endpoint(request.kind);
    let base = format!("{}/{}", base_url.trim_end_matches('/'), endpoint.path);
    let mut url = Url::parse(&base).map_err(|e| SourceError::Url {
        message: format!("{base}: {e}"),
    })?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair(endpoint.id_param, &request.entity_id);
        if let Some(start) = request.range.start {
            query.append_pair(endpoint.start_param, &start.format("%Y-%m-%d").to_string());
        }
        if let Some(end) = request.range.end {
            query.append_pair(endpoint.end_param, &end.format("%Y-%m-%d").to_string());
        }
        for (key, value) in endpoint.fixed_params {
            query.append_pair(key, value);
        }
        query.append_pair(PAGE_SIZE_PARAM, &page_size.to_string());
    }

    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use water_norms_series_models::DateRange;

    use super::*;

    #[test]
    fn discharge_url_requests_daily_mean_flow() {
        let request = SeriesRequest::new(SeriesKind::Discharge, "K447001001");
        let url = first_page_url(DEFAULT_BASE_URL, &request, 5000).unwrap();
        assert_eq!(
            url,
            "https://hubeau.eaufrance.fr/api/v1/hydrometrie/obs_elab\
             ?code_entite=K447001001&grandeur_hydro_elab=QmJ&size=5000"
        );
    }

    #[test]
    fn groundwater_url_encodes_bss_code_and_range() {
        let request = SeriesRequest::new(SeriesKind::GroundwaterLevel, "07548X0009/F").with_range(
            DateRange {
                start: NaiveDate::from_ymd_opt(2000, 1, 1),
                end: NaiveDate::from_ymd_opt(2020, 12, 31),
            },
        );
        let url = first_page_url("https://example.org/api/", &request, 100).unwrap();
        assert_eq!(
            url,
            "https://example.org/api/niveaux_nappes/chroniques\
             ?code_bss=07548X0009%2FF&date_debut_mesure=2000-01-01\
             &date_fin_mesure=2020-12-31&size=100"
        );
    }

    #[test]
    fn rejects_relative_base_url() {
        let request = SeriesRequest::new(SeriesKind::Discharge, "X");
        assert!(matches!(
            first_page_url("not a url", &request, 10),
            Err(SourceError::Url { .. })
        ));
    }
}
