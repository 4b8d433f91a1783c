//! Session presence detection. Session stores are proprietary binary (Chromium
//! SNSS) or mozLz4-compressed (Firefox) files; their existence is recorded
//! with an unsupported-format record and the contents are never decoded.

use crate::parsers::browser::{ArtifactKind, ArtifactRecord, BrowserKind, BrowserProfile};
use crate::parsers::{ArtifactExtractor, ExtractionContext, each_firefox_profile, guarded};

const CHROMIUM_SESSION_SOURCES: [&str; 2] = ["Sessions", "Current Session"];
const FIREFOX_SESSION_STORE: &str = "sessionstore.jsonlz4";

pub struct SessionsExtractor;

impl ArtifactExtractor for SessionsExtractor {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Session
    }

    fn extract(&self, profile: &BrowserProfile, ctx: &ExtractionContext<'_>) -> Vec<ArtifactRecord> {
        let mut out = Vec::new();
        let kind = self.kind();
        match profile.browser {
            BrowserKind::Chrome | BrowserKind::Edge => {
                let dir = profile.profile_dir();
                guarded(ctx, kind, profile.browser, dir, &mut out, |out| {
                    for name in CHROMIUM_SESSION_SOURCES {
                        if dir.join(name).try_exists()? {
                            out.push(ArtifactRecord::unsupported(
                                ctx.host,
                                profile.browser,
                                kind,
                                dir,
                                "<session data>",
                                "binary session not parsed".to_string(),
                            ));
                            break;
                        }
                    }
                    Ok(())
                });
            }
            BrowserKind::Firefox => {
                each_firefox_profile(ctx, kind, &profile.path, &mut out, |dir, out| {
                    let store = dir.join(FIREFOX_SESSION_STORE);
                    if !store.try_exists()? {
                        return Ok(());
                    }
                    let size = std::fs::metadata(&store)?.len();
                    out.push(ArtifactRecord::unsupported(
                        ctx.host,
                        BrowserKind::Firefox,
                        kind,
                        dir,
                        "<sessionstore>",
                        format!("size={size}"),
                    ));
                    Ok(())
                });
            }
            BrowserKind::Safari => {}
        }
        out
    }
}
