//! Viewer module - generates the browser page that hosts the three.js viewer.
//!
//! The page implements the same interactions as [`crate::viewer::ViewerSession`]:
//! login, upload, click to inspect a component, double-click on the ground
//! plane to annotate, and search to highlight matching components.

use crate::store::MODELS_URL_PREFIX;

/// three.js release loaded from the CDN.
pub const THREE_VERSION: &str = "0.160.0";

/// Escape HTML special characters to prevent XSS attacks.
fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Generate the viewer page.
///
/// # Arguments
///
/// * `initial_model` - Model URL to load after login. Only URLs under
///   `/models/` are honoured; anything else is ignored.
pub fn generate_viewer_html(initial_model: Option<&str>) -> String {
    let prefix = format!("{}/", MODELS_URL_PREFIX);
    let initial_model = initial_model
        .filter(|url| url.starts_with(&prefix))
        .map(html_escape)
        .unwrap_or_default();

    VIEWER_TEMPLATE
        .replace("__THREE_VERSION__", THREE_VERSION)
        .replace("__INITIAL_MODEL__", &initial_model)
}

const VIEWER_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Model Viewer</title>
    <script type="importmap">
    {
        "imports": {
            "three": "https://cdn.jsdelivr.net/npm/three@__THREE_VERSION__/build/three.module.js",
            "three/addons/": "https://cdn.jsdelivr.net/npm/three@__THREE_VERSION__/examples/jsm/"
        }
    }
    </script>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            background: #0f0f0f;
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            overflow: hidden;
            color: #fff;
        }
        #canvas { width: 100vw; height: 100vh; display: block; }
        .panel {
            position: absolute;
            background: rgba(0, 0, 0, 0.85);
            padding: 14px 18px;
            border-radius: 8px;
            font-size: 13px;
            line-height: 1.5;
            border: 1px solid rgba(255, 255, 255, 0.1);
            z-index: 1000;
        }
        .panel input, .panel button { font-size: 12px; margin: 2px 0; padding: 3px 6px; }
        #toolbar { top: 16px; left: 16px; max-width: 340px; }
        #metadata { top: 16px; right: 16px; max-width: 320px; display: none; }
        #metadata pre { font-size: 11px; white-space: pre-wrap; color: rgba(255, 255, 255, 0.85); }
        #status { bottom: 16px; left: 16px; font-size: 11px; color: rgba(255, 255, 255, 0.6); }
        .hidden { display: none; }
    </style>
</head>
<body data-initial-model="__INITIAL_MODEL__">
    <canvas id="canvas"></canvas>

    <div id="toolbar" class="panel">
        <form id="login-form">
            <input id="username" placeholder="username" autocomplete="username">
            <input id="password" type="password" placeholder="password" autocomplete="current-password">
            <button type="submit">Login</button>
        </form>
        <div id="tools" class="hidden">
            <input id="file" type="file" accept=".obj,.stl,.dwg">
            <button id="upload">Upload</button><br>
            <input id="search-type" placeholder="type (e.g. valve)">
            <input id="search-pressure" type="number" placeholder="min pressure">
            <button id="search">Search</button>
            <button id="clear">Clear</button>
        </div>
    </div>

    <div id="metadata" class="panel"><pre id="metadata-body"></pre></div>
    <div id="status" class="panel">Log in to start. Click a component to inspect it, double-click the ground to annotate.</div>

    <script type="module">
        import * as THREE from 'three';
        import { GLTFLoader } from 'three/addons/loaders/GLTFLoader.js';
        import { OrbitControls } from 'three/addons/controls/OrbitControls.js';

        const canvas = document.getElementById('canvas');
        const statusEl = document.getElementById('status');
        const setStatus = (text) => { statusEl.textContent = text; };

        // Render context: everything the event handlers touch lives here
        const ctx = {
            token: null,
            renderer: new THREE.WebGLRenderer({ canvas, antialias: true }),
            scene: new THREE.Scene(),
            camera: new THREE.PerspectiveCamera(60, window.innerWidth / window.innerHeight, 0.1, 1000),
            model: null,
            markers: new THREE.Group(),
            highlighted: new Map(),
            selectionSeq: 0,
        };
        ctx.renderer.setSize(window.innerWidth, window.innerHeight);
        ctx.camera.position.set(0, 2, 5);
        ctx.scene.background = new THREE.Color(0x1a1a1a);
        ctx.scene.add(new THREE.AmbientLight(0xffffff, 0.6));
        const sun = new THREE.DirectionalLight(0xffffff, 0.8);
        sun.position.set(5, 10, 7);
        ctx.scene.add(sun);
        ctx.scene.add(new THREE.GridHelper(20, 20, 0x444444, 0x2a2a2a));
        ctx.scene.add(ctx.markers);
        const controls = new OrbitControls(ctx.camera, canvas);

        function animate() {
            requestAnimationFrame(animate);
            controls.update();
            ctx.renderer.render(ctx.scene, ctx.camera);
        }
        animate();

        window.addEventListener('resize', () => {
            ctx.camera.aspect = window.innerWidth / window.innerHeight;
            ctx.camera.updateProjectionMatrix();
            ctx.renderer.setSize(window.innerWidth, window.innerHeight);
        });

        async function api(path, options = {}) {
            if (!ctx.token && path !== '/api/login') throw new Error('Not logged in');
            const headers = Object.assign({}, options.headers || {});
            if (ctx.token) headers['Authorization'] = 'Bearer ' + ctx.token;
            const response = await fetch(path, Object.assign({}, options, { headers }));
            const body = await response.json().catch(() => ({}));
            if (!response.ok) throw new Error(body.message || ('HTTP ' + response.status));
            return body;
        }

        function pointerRay(event) {
            const rect = canvas.getBoundingClientRect();
            const ndc = new THREE.Vector2(
                ((event.clientX - rect.left) / rect.width) * 2 - 1,
                -((event.clientY - rect.top) / rect.height) * 2 + 1
            );
            const raycaster = new THREE.Raycaster();
            raycaster.setFromCamera(ndc, ctx.camera);
            return raycaster;
        }

        function loadModel(url) {
            new GLTFLoader().load(url, (gltf) => {
                if (ctx.model) ctx.scene.remove(ctx.model);
                ctx.highlighted.clear();
                ctx.model = gltf.scene;
                ctx.model.traverse((obj) => {
                    if (obj.isMesh) {
                        obj.material = obj.material.clone();
                        obj.material.side = THREE.DoubleSide;
                    }
                });
                ctx.scene.add(ctx.model);
                setStatus('Loaded ' + url);
            }, undefined, (err) => setStatus('Failed to load model: ' + err.message));
        }

        function addMarker(point, pending) {
            const marker = new THREE.Mesh(
                new THREE.SphereGeometry(0.05, 16, 16),
                new THREE.MeshBasicMaterial({ color: pending ? 0xff9999 : 0xff0000 })
            );
            marker.position.copy(point);
            ctx.markers.add(marker);
            return marker;
        }

        function clearHighlights() {
            for (const [mesh, original] of ctx.highlighted) mesh.material = original;
            ctx.highlighted.clear();
        }

        // GLTFLoader sanitizes node.name and keeps the original in userData
        function componentName(obj) {
            return (obj.userData && obj.userData.name) || obj.name;
        }

        function applyHighlights(ids) {
            if (!ctx.model) return;
            const wanted = new Set(ids.map(String));
            ctx.model.traverse((obj) => {
                if (!obj.isMesh) return;
                let node = obj;
                while (node && !wanted.has(componentName(node))) node = node.parent;
                if (node && !ctx.highlighted.has(obj)) {
                    ctx.highlighted.set(obj, obj.material);
                    obj.material = obj.material.clone();
                    obj.material.color = new THREE.Color(0xffff00);
                }
            });
        }

        async function loadAnnotations() {
            const rows = await api('/api/annotations');
            ctx.markers.clear();
            for (const row of rows) addMarker(new THREE.Vector3(row.x, row.y, row.z), false);
        }

        document.getElementById('login-form').addEventListener('submit', async (event) => {
            event.preventDefault();
            try {
                const body = await api('/api/login', {
                    method: 'POST',
                    headers: { 'Content-Type': 'application/json' },
                    body: JSON.stringify({
                        username: document.getElementById('username').value,
                        password: document.getElementById('password').value,
                    }),
                });
                ctx.token = body.token;
                document.getElementById('login-form').classList.add('hidden');
                document.getElementById('tools').classList.remove('hidden');
                setStatus('Logged in');
                await loadAnnotations();
                const initial = document.body.dataset.initialModel;
                if (initial) loadModel(initial);
            } catch (err) {
                setStatus('Login failed: ' + err.message);
            }
        });

        document.getElementById('upload').addEventListener('click', async () => {
            const file = document.getElementById('file').files[0];
            if (!file) return;
            const form = new FormData();
            form.append('model', file);
            setStatus('Converting ' + file.name + '...');
            try {
                const body = await api('/api/upload', { method: 'POST', body: form });
                loadModel(body.url);
            } catch (err) {
                setStatus('Upload failed: ' + err.message);
            }
        });

        canvas.addEventListener('click', async (event) => {
            if (!ctx.model || !ctx.token) return;
            const hits = pointerRay(event).intersectObjects(ctx.model.children, true);
            if (hits.length === 0) return;
            let node = hits[0].object;
            while (node && !componentName(node)) node = node.parent;
            if (!node) return;
            const id = componentName(node);
            const seq = ++ctx.selectionSeq;
            try {
                const row = await api('/api/metadata/' + encodeURIComponent(id));
                if (seq !== ctx.selectionSeq) return;
                document.getElementById('metadata').style.display = 'block';
                document.getElementById('metadata-body').textContent =
                    id + '\n' + JSON.stringify(row, null, 2);
            } catch (err) {
                if (seq === ctx.selectionSeq) setStatus('Metadata failed: ' + err.message);
            }
        });

        canvas.addEventListener('dblclick', async (event) => {
            if (!ctx.token) return;
            const ground = new THREE.Plane(new THREE.Vector3(0, 1, 0), 0);
            const point = new THREE.Vector3();
            if (!pointerRay(event).ray.intersectPlane(ground, point)) return;
            const note = window.prompt('Annotation');
            if (!note) return;
            const marker = addMarker(point, true);
            try {
                const row = await api('/api/annotations', {
                    method: 'POST',
                    headers: { 'Content-Type': 'application/json' },
                    body: JSON.stringify({ x: point.x, y: point.y, z: point.z, note }),
                });
                marker.position.set(row.x, row.y, row.z);
                marker.material.color.set(0xff0000);
            } catch (err) {
                ctx.markers.remove(marker);
                setStatus('Annotation failed: ' + err.message);
            }
        });

        document.getElementById('search').addEventListener('click', async () => {
            const params = new URLSearchParams({
                type: document.getElementById('search-type').value,
                pressureMin: document.getElementById('search-pressure').value || '0',
            });
            try {
                const ids = await api('/api/search?' + params);
                applyHighlights(ids);
                setStatus(ids.length + ' matching component(s)');
            } catch (err) {
                setStatus('Search failed: ' + err.message);
            }
        });

        document.getElementById('clear').addEventListener('click', clearHighlights);
    </script>
</body>
</html>"##;
