//! Template validation: version policy and internal/beta gating
//!
//! These checks run on a successful lookup and turn it into a failure when
//! the template must not be installed on this ModuleSet.

use kube::ResourceExt;
use lifecycle_common::crd::{ModuleReleaseMeta, ModuleSet, ModuleStatus, ModuleTemplate};
use semver::Version;
use tracing::{info, warn};

use crate::error::LookupError;
use crate::strategy::ResolutionResult;

/// Parse a strict semantic version
///
/// A single leading `v` is accepted. Anything else that is not semver is an
/// error, never coerced.
pub fn parse_version(value: &str) -> Result<Version, LookupError> {
    let trimmed = value.strip_prefix('v').unwrap_or(value);
    Version::parse(trimmed).map_err(|e| LookupError::InvalidVersion {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Whether moving from `old` to `new` is allowed
///
/// Only (major, minor, patch) are compared, so pre-release and build
/// metadata never block a change.
pub fn is_valid_version_change(new: &Version, old: &Version) -> bool {
    (new.major, new.minor, new.patch) >= (old.major, old.minor, old.patch)
}

/// Refuse a channel switch that would move the module to a lower version
///
/// Only applies when the tracked record references a template and its
/// channel differs from the newly desired one. The tracked record itself is
/// left untouched; the caller keeps it on refusal.
pub fn check_channel_skew(result: &mut ResolutionResult, tracked: &ModuleStatus) {
    if result.error.is_some() {
        return;
    }
    let Some(template) = result.template.as_ref() else {
        return;
    };
    let Some(previous) = tracked.template.as_ref() else {
        return;
    };

    log_generation_skew(template, tracked, previous.generation);

    if tracked.channel == result.desired_channel {
        return;
    }

    info!(
        module = %tracked.name,
        template = %template.name_any(),
        previous_channel = %tracked.channel,
        new_channel = %result.desired_channel,
        "outdated module template: channel skew"
    );

    let new_version = match template.version().map(parse_version) {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            warn!(module = %tracked.name, error = %e, "template carries an invalid version");
            result.fail(update_refused(
                "could not handle channel skew as template contains invalid version",
            ));
            return;
        }
        None => {
            warn!(module = %tracked.name, "template carries no version");
            result.fail(update_refused(
                "could not handle channel skew as template contains invalid version",
            ));
            return;
        }
    };

    let old_version = match parse_version(&tracked.version) {
        Ok(v) => v,
        Err(e) => {
            warn!(module = %tracked.name, error = %e, "tracked status carries an invalid version");
            result.fail(update_refused(
                "could not handle channel skew as module status contains invalid version",
            ));
            return;
        }
    };

    if !is_valid_version_change(&new_version, &old_version) {
        let reason = format!(
            "ignore channel skew (from {} to {}), as a higher version ({}) of the module was previously installed",
            tracked.channel, result.desired_channel, old_version
        );
        info!(
            module = %tracked.name,
            new_version = %new_version,
            old_version = %old_version,
            "{reason}"
        );
        result.fail(update_refused(reason));
    }
}

fn update_refused(reason: impl Into<String>) -> LookupError {
    LookupError::TemplateUpdateNotAllowed {
        reason: reason.into(),
    }
}

/// A template edited in place keeps its version but bumps its generation
fn log_generation_skew(template: &ModuleTemplate, tracked: &ModuleStatus, previous: i64) {
    let current = template.metadata.generation.unwrap_or_default();
    if current != previous && template.version() == Some(tracked.version.as_str()) {
        info!(
            module = %tracked.name,
            template = %template.name_any(),
            previous_generation = previous,
            new_generation = current,
            "module template changed without a version bump"
        );
    }
}

/// Refuse internal or beta templates on ModuleSets not opted in
///
/// When release metadata exists its own flags decide; otherwise the
/// template's labels do.
pub fn validate_template_mode(
    result: &mut ResolutionResult,
    module_set: &ModuleSet,
    release_meta: Option<&ModuleReleaseMeta>,
) {
    if result.error.is_some() {
        return;
    }
    let Some(template) = result.template.as_ref() else {
        return;
    };

    let refusal = match release_meta {
        Some(meta) => ((meta.spec.internal && !module_set.is_internal())
            || (meta.spec.beta && !module_set.is_beta()))
        .then_some("module is beta or internal"),
        None if template.is_internal() && !module_set.is_internal() => Some("internal module"),
        None if template.is_beta() && !module_set.is_beta() => Some("beta module"),
        None => None,
    };

    if let Some(reason) = refusal {
        result.fail(LookupError::TemplateNotAllowed {
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifecycle_common::crd::{
        ModuleReleaseMetaSpec, ModuleSetSpec, ModuleTemplateSpec, TrackingObject,
    };
    use lifecycle_common::{BETA_LABEL, INTERNAL_LABEL};
    use proptest::prelude::*;

    fn v(s: &str) -> Version {
        parse_version(s).unwrap()
    }

    // =========================================================================
    // Version law
    // =========================================================================

    mod versions {
        use super::*;

        #[test]
        fn test_prerelease_bump_is_allowed() {
            assert!(is_valid_version_change(&v("1.0.0-rc2"), &v("1.0.0-rc1")));
        }

        #[test]
        fn test_downgrade_is_refused() {
            assert!(!is_valid_version_change(&v("1.0.0"), &v("1.0.1")));
        }

        #[test]
        fn test_upgrade_is_allowed() {
            assert!(is_valid_version_change(&v("1.0.1"), &v("1.0.0")));
        }

        #[test]
        fn test_leading_v_is_accepted() {
            assert_eq!(v("v2.1.0"), Version::new(2, 1, 0));
        }

        #[test]
        fn test_garbage_is_rejected() {
            for bad in ["", "latest", "1.0", "1", "vv1.0.0", "1.0.0.0"] {
                assert!(parse_version(bad).is_err(), "{bad} parsed");
            }
        }

        proptest! {
            /// The truncated comparison agrees with tuple ordering and
            /// ignores pre-release tags.
            #[test]
            fn prop_version_law(
                a in (0u64..5, 0u64..5, 0u64..5),
                b in (0u64..5, 0u64..5, 0u64..5),
                pre in prop_oneof![Just(""), Just("-rc1"), Just("-alpha.2")],
            ) {
                let new = v(&format!("{}.{}.{}{}", a.0, a.1, a.2, pre));
                let old = v(&format!("{}.{}.{}", b.0, b.1, b.2));
                prop_assert_eq!(is_valid_version_change(&new, &old), a >= b);
            }
        }
    }

    // =========================================================================
    // Channel skew
    // =========================================================================

    mod channel_skew {
        use super::*;

        fn resolved(version: &str, channel: &str) -> ResolutionResult {
            ResolutionResult::resolved(
                ModuleTemplate::new(
                    "keda",
                    ModuleTemplateSpec {
                        module_name: Some("keda".to_string()),
                        version: Some(version.to_string()),
                        channel: Some(channel.to_string()),
                        ..Default::default()
                    },
                ),
                channel,
            )
        }

        fn tracked(version: &str, channel: &str) -> ModuleStatus {
            ModuleStatus {
                name: "keda".to_string(),
                version: version.to_string(),
                channel: channel.to_string(),
                template: Some(TrackingObject::default()),
                ..Default::default()
            }
        }

        /// Story: switching from fast (2.0.0) back to regular (1.0.0) would
        /// downgrade the module, so the switch is refused.
        #[test]
        fn story_channel_switch_to_lower_version_is_refused() {
            let mut result = resolved("1.0.0", "regular");
            check_channel_skew(&mut result, &tracked("2.0.0", "fast"));

            let err = result.error.expect("refusal");
            assert!(matches!(err, LookupError::TemplateUpdateNotAllowed { .. }));
            assert!(err.to_string().contains("from fast to regular"));
            assert!(result.template.is_none());
        }

        #[test]
        fn test_channel_switch_to_higher_version_passes() {
            let mut result = resolved("2.1.0", "fast");
            check_channel_skew(&mut result, &tracked("2.0.0", "regular"));
            assert!(result.is_ok());
        }

        #[test]
        fn test_same_channel_is_not_skew() {
            let mut result = resolved("1.0.0", "regular");
            check_channel_skew(&mut result, &tracked("2.0.0", "regular"));
            assert!(result.is_ok());
        }

        #[test]
        fn test_untracked_template_is_not_checked() {
            let mut result = resolved("1.0.0", "regular");
            let mut status = tracked("2.0.0", "fast");
            status.template = None;
            check_channel_skew(&mut result, &status);
            assert!(result.is_ok());
        }

        #[test]
        fn test_unparsable_tracked_version_is_refused() {
            let mut result = resolved("1.0.0", "regular");
            check_channel_skew(&mut result, &tracked("not-a-version", "fast"));
            assert!(matches!(
                result.error,
                Some(LookupError::TemplateUpdateNotAllowed { .. })
            ));
        }

        #[test]
        fn test_unparsable_template_version_is_refused() {
            let mut result = resolved("latest", "regular");
            check_channel_skew(&mut result, &tracked("1.0.0", "fast"));
            assert!(matches!(
                result.error,
                Some(LookupError::TemplateUpdateNotAllowed { .. })
            ));
        }

        #[test]
        fn test_generation_skew_never_blocks() {
            let mut result = resolved("1.0.0", "regular");
            if let Some(t) = result.template.as_mut() {
                t.metadata.generation = Some(5);
            }
            let mut status = tracked("1.0.0", "regular");
            status.template = Some(TrackingObject {
                generation: 2,
                ..Default::default()
            });
            check_channel_skew(&mut result, &status);
            assert!(result.is_ok());
        }
    }

    // =========================================================================
    // Internal / beta gating
    // =========================================================================

    mod gating {
        use super::*;

        fn labelled(label: Option<&str>) -> ResolutionResult {
            let mut t = ModuleTemplate::new("keda-1.0.0", ModuleTemplateSpec::default());
            if let Some(label) = label {
                t.labels_mut().insert(label.to_string(), "true".to_string());
            }
            ResolutionResult::resolved(t, "regular")
        }

        fn module_set(label: Option<&str>) -> ModuleSet {
            let mut set = ModuleSet::new("cluster-a", ModuleSetSpec::default());
            if let Some(label) = label {
                set.labels_mut().insert(label.to_string(), "true".to_string());
            }
            set
        }

        #[test]
        fn test_internal_template_needs_internal_set() {
            let mut result = labelled(Some(INTERNAL_LABEL));
            validate_template_mode(&mut result, &module_set(None), None);
            let err = result.error.expect("refusal");
            assert_eq!(err.to_string(), "module template not allowed: internal module");

            let mut result = labelled(Some(INTERNAL_LABEL));
            validate_template_mode(&mut result, &module_set(Some(INTERNAL_LABEL)), None);
            assert!(result.is_ok());
        }

        #[test]
        fn test_beta_template_needs_beta_set() {
            let mut result = labelled(Some(BETA_LABEL));
            validate_template_mode(&mut result, &module_set(None), None);
            assert!(result.error.is_some());

            let mut result = labelled(Some(BETA_LABEL));
            validate_template_mode(&mut result, &module_set(Some(BETA_LABEL)), None);
            assert!(result.is_ok());
        }

        /// Story: with release metadata present, its flags decide and the
        /// template's labels are not consulted.
        #[test]
        fn story_release_meta_flags_decide() {
            let meta = ModuleReleaseMeta::new(
                "keda",
                ModuleReleaseMetaSpec {
                    beta: true,
                    ..Default::default()
                },
            );

            let mut result = labelled(None);
            validate_template_mode(&mut result, &module_set(None), Some(&meta));
            assert_eq!(
                result.error.map(|e| e.to_string()),
                Some("module template not allowed: module is beta or internal".to_string())
            );

            let mut result = labelled(Some(INTERNAL_LABEL));
            let plain = ModuleReleaseMeta::new("keda", ModuleReleaseMetaSpec::default());
            validate_template_mode(&mut result, &module_set(None), Some(&plain));
            assert!(result.is_ok());
        }
    }
}
