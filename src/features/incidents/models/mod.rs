mod incident;

pub use incident::{
    CreateIncident, Incident, IncidentFilter, IncidentStatus, MapMarker, UpdateIncident,
};
