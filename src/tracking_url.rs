use std::collections::BTreeMap;

use url::Url;

use crate::core::models::{MetricsResponse, SUB_ID_PATH_KEY};

/// Builds the destination URL from a metrics response.
///
/// Organic installs keep the response URL and its query as-is and get the
/// tracking pairs appended. Non-organic installs get `sub_id_2` as an extra
/// path segment and a query built from the remaining parameters (sorted by
/// key) followed by the tracking pairs.
///
/// Returns `None` when the response URL cannot be used as a base URL.
#[must_use]
pub fn build_destination_url(
    response: &MetricsResponse,
    advertising_id: Option<&str>,
    bundle_id: &str,
    push_subscriber_id: Option<&str>,
) -> Option<Url> {
    let mut url = Url::parse(response.url.trim()).ok()?;
    if url.cannot_be_a_base() {
        return None;
    }

    if !response.is_organic {
        if let Some(sub_id) = response
            .parameters
            .get(SUB_ID_PATH_KEY)
            .filter(|v| !v.is_empty())
        {
            url.path_segments_mut().ok()?.pop_if_empty().push(sub_id);
        }

        url.set_query(None);
        let campaign: BTreeMap<&str, &str> = response
            .parameters
            .iter()
            .filter(|(k, _)| k.as_str() != SUB_ID_PATH_KEY)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if !campaign.is_empty() {
            url.query_pairs_mut().extend_pairs(campaign);
        }
    }

    append_tracking_pairs(&mut url, advertising_id, bundle_id, push_subscriber_id);
    Some(url)
}

fn append_tracking_pairs(
    url: &mut Url,
    advertising_id: Option<&str>,
    bundle_id: &str,
    push_subscriber_id: Option<&str>,
) {
    let mut pairs = url.query_pairs_mut();
    pairs.append_pair("bundle", bundle_id);
    if let Some(idfa) = advertising_id.filter(|v| !v.is_empty()) {
        pairs.append_pair("idfa", idfa);
    }
    if let Some(subscriber) = push_subscriber_id.filter(|v| !v.is_empty()) {
        pairs.append_pair("onesignal_id", subscriber);
    }
}
