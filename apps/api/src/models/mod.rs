pub mod profile;

pub use profile::CandidateProfile;
