/// Self-contained D3 live view of the growing graph, driven entirely by
/// the WebSocket event vocabulary.
pub const GRAPH_VIZ_HTML: &str = r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Ontograph</title>
    <script src="https://d3js.org/d3.v7.min.js"></script>
    <style>
        body { margin: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; background: #111; color: #eee; }
        #status { position: fixed; top: 10px; left: 10px; background: rgba(0,0,0,0.8); padding: 10px 14px; border-radius: 8px; font-size: 12px; z-index: 1000; }
        .link { stroke: #666; stroke-opacity: 0.6; }
        .node-label { font-size: 9px; fill: #ddd; pointer-events: none; text-shadow: 0 0 3px #000; }
    </style>
</head>
<body>
    <div id="status">connecting…</div>
    <svg id="graph"></svg>
    <script>
        const width = window.innerWidth, height = window.innerHeight;
        const svg = d3.select("#graph").attr("width", width).attr("height", height);
        const g = svg.append("g");
        svg.call(d3.zoom().scaleExtent([0.05, 8]).on("zoom", e => g.attr("transform", e.transform)));

        const nodesById = new Map();
        let nodes = [], links = [], processingId = null;

        const simulation = d3.forceSimulation(nodes)
            .force("link", d3.forceLink(links).id(d => d.id).distance(60))
            .force("charge", d3.forceManyBody().strength(-120))
            .force("center", d3.forceCenter(width / 2, height / 2));

        function color(d) {
            if (d.id === processingId) return "#ef4444";
            if (d.state === "true") return "#3b82f6";
            if (d.state === "skipped") return "#6b7280";
            return "#f59e0b";
        }

        function addNode(n) {
            if (nodesById.has(n.id)) { Object.assign(nodesById.get(n.id), n); return; }
            const node = { ...n, x: width / 2 + (Math.random() - 0.5) * 50, y: height / 2 + (Math.random() - 0.5) * 50 };
            nodesById.set(n.id, node);
            nodes.push(node);
        }

        function addLink(from, to) {
            if (!nodesById.has(from) || !nodesById.has(to)) return;
            if (links.some(l => (l.source.id || l.source) === from && (l.target.id || l.target) === to)) return;
            links.push({ source: from, target: to });
        }

        function render() {
            const link = g.selectAll("line").data(links);
            link.enter().append("line").attr("class", "link");
            link.exit().remove();

            const node = g.selectAll("circle").data(nodes, d => d.id);
            node.enter().append("circle").attr("r", d => 4 + d.importance).merge(node).attr("fill", color);
            node.exit().remove();

            const label = g.selectAll("text").data(nodes, d => d.id);
            label.enter().append("text").attr("class", "node-label").text(d => d.topic);
            label.exit().remove();

            simulation.nodes(nodes);
            simulation.force("link").links(links);
            simulation.alpha(0.5).restart();
        }

        simulation.on("tick", () => {
            g.selectAll("line")
                .attr("x1", d => d.source.x).attr("y1", d => d.source.y)
                .attr("x2", d => d.target.x).attr("y2", d => d.target.y);
            g.selectAll("circle").attr("cx", d => d.x).attr("cy", d => d.y);
            g.selectAll("text").attr("x", d => d.x + 7).attr("y", d => d.y + 3);
        });

        const status = document.getElementById("status");
        const proto = location.protocol === "https:" ? "wss" : "ws";
        const ws = new WebSocket(`${proto}://${location.host}/ws`);

        ws.onopen = () => { status.textContent = "live"; };
        ws.onclose = () => { status.textContent = "disconnected"; };
        ws.onmessage = msg => {
            const { event, data } = JSON.parse(msg.data);
            if (event === "existing_nodes") {
                data.forEach(addNode);
                data.forEach(n => { if (n.primaryParentId) addLink(n.primaryParentId, n.id); });
            } else if (event === "existing_edges") {
                data.forEach(e => addLink(e.parentId, e.childId));
            } else if (event === "new_node") {
                addNode(data);
            } else if (event === "new_edge") {
                addLink(data.from, data.to);
            } else if (event === "update_node") {
                processingId = data.id;
                addNode(data);
                status.textContent = `expanding: ${data.topic}`;
            } else if (event === "batch_ready") {
                processingId = null;
                status.textContent = `${nodes.length} topics`;
            }
            render();
        };
    </script>
</body>
</html>
"##;
