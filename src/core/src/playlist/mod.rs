mod api;
mod provider;
mod spotify;
mod state;
mod youtube;

pub use api::{AuthorizedClient, ClientAuth, OAuthToken};
pub use provider::{PlaylistEntry, PlaylistProvider, PlaylistTarget, ProviderKind};
pub use spotify::{search_queries, SpotifyProvider};
pub use state::{
    End, InsertOutcome, InsertPlan, PlaylistMode, PlaylistState, DUPLICATE_WINDOW_SECS,
};
pub use youtube::YouTubeProvider;
