use super::context::VuList;
use super::error::IntersectError;
use crate::topology::brep::{EdgeGeomId, FaceUseId, Model, VertexUseId};

/// Everything a face cutter needs for one pair: the two face-uses (a side is
/// `None` when it is a bare wire), the line geometry the cut runs along if
/// one is known, and both ordered lists with their distances along the line.
#[derive(Debug, Clone, PartialEq)]
pub struct CutRequest {
    pub fu1: Option<FaceUseId>,
    pub fu2: Option<FaceUseId>,
    pub on_eg: Option<EdgeGeomId>,
    pub list1: Vec<(VertexUseId, f64)>,
    pub list2: Vec<(VertexUseId, f64)>,
}

impl CutRequest {
    pub(crate) fn new(
        fu1: Option<FaceUseId>,
        fu2: Option<FaceUseId>,
        on_eg: Option<EdgeGeomId>,
        l1: &VuList,
        l2: &VuList,
    ) -> Self {
        Self {
            fu1,
            fu2,
            on_eg,
            list1: l1.iter().collect(),
            list2: l2.iter().collect(),
        }
    }
}

/// Turns the ordered vertex-use lists of a face pair into new loops and edges.
///
/// The engine calls this once per resolved pair. The returned line geometry,
/// if any, is the one the cutter actually laid its new edges on; it may differ
/// from `request.on_eg` when the cutter fused geometries.
pub trait FaceCutter {
    fn cut(&mut self, model: &mut Model, request: &CutRequest) -> Result<Option<EdgeGeomId>, IntersectError>;
}

/// A cutter that edits nothing and keeps every request it was handed.
#[derive(Debug, Default)]
pub struct RecordingCutter {
    pub requests: Vec<CutRequest>,
}

impl RecordingCutter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FaceCutter for RecordingCutter {
    fn cut(&mut self, _model: &mut Model, request: &CutRequest) -> Result<Option<EdgeGeomId>, IntersectError> {
        self.requests.push(request.clone());
        Ok(request.on_eg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_cutter_keeps_requests() {
        let mut model = Model::new();
        let mut cutter = RecordingCutter::new();
        let request = CutRequest::new(None, None, None, &VuList::default(), &VuList::default());
        assert_eq!(cutter.cut(&mut model, &request).unwrap(), None);
        assert_eq!(cutter.requests.len(), 1);
        assert!(cutter.requests[0].list1.is_empty());
    }
}
